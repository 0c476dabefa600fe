//! Byte-stream collaborators: decoder, encoder, and concatenator.
//!
//! The core never touches the compressed container format. It consumes a
//! decompressed line stream from a decoder, hands sorted line streams to an
//! encoder (one invocation per shard), and asks a concatenator to merge the
//! shards container-aware. [`ContainerCodec`] is the seam: [`ProcessCodec`]
//! drives samtools- or sambamba-flavored child processes over pipes, and
//! [`TextCodec`] implements the same contract over plain files so the whole
//! pipeline can run hermetically in tests.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::errors::{Result, SortError};

/// Spawns the three external collaborators of the pipeline.
pub trait ContainerCodec: Send + Sync {
    /// Starts a decoder producing the decompressed line stream of `input`,
    /// header lines first. Invoked once per streaming pass.
    fn spawn_reader(&self, input: &Path) -> Result<RecordReader>;

    /// Starts an encoder that accepts a line stream and writes one
    /// compressed shard to `output`.
    fn spawn_writer(&self, output: &Path) -> Result<RecordWriter>;

    /// Merges `shards` into `output` in the given order, container-aware.
    fn concatenate(&self, shards: &[PathBuf], output: &Path) -> Result<()>;
}

/// A decoded line stream produced by a decoder collaborator.
pub struct RecordReader {
    inner: Box<dyn BufRead + Send>,
    child: Option<Child>,
    label: String,
    path: PathBuf,
}

impl std::fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("child", &self.child)
            .field("label", &self.label)
            .field("path", &self.path)
            .finish()
    }
}

impl RecordReader {
    fn from_stream(inner: Box<dyn BufRead + Send>, label: String, path: &Path) -> Self {
        Self { inner, child: None, label, path: path.to_path_buf() }
    }

    fn from_child(mut child: Child, label: String, path: &Path) -> Result<Self> {
        let stdout = child.stdout.take().ok_or_else(|| SortError::CollaboratorFailure {
            collaborator: label.clone(),
            reason: "no stdout pipe".to_string(),
        })?;
        Ok(Self {
            inner: Box::new(BufReader::new(stdout)),
            child: Some(child),
            label,
            path: path.to_path_buf(),
        })
    }

    /// Reads the next line into `buf`, replacing its contents and stripping
    /// the trailing newline. Returns `false` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::IoFailure`] if the underlying read fails.
    pub fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.clear();
        let n = self
            .inner
            .read_until(b'\n', buf)
            .map_err(|e| SortError::IoFailure { path: self.path.clone(), source: e })?;
        if n == 0 {
            return Ok(false);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        Ok(true)
    }

    /// Closes the stream and surfaces a nonzero decoder exit.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::CollaboratorFailure`] if the decoder child
    /// exited with a nonzero status.
    pub fn finish(self) -> Result<()> {
        let Self { inner, child, label, .. } = self;
        drop(inner);
        wait_for_exit(child, &label)
    }
}

/// A line sink feeding an encoder collaborator.
pub struct RecordWriter {
    inner: Box<dyn Write + Send>,
    child: Option<Child>,
    label: String,
    path: PathBuf,
}

impl RecordWriter {
    fn from_stream(inner: Box<dyn Write + Send>, label: String, path: &Path) -> Self {
        Self { inner, child: None, label, path: path.to_path_buf() }
    }

    fn from_child(mut child: Child, label: String, path: &Path) -> Result<Self> {
        let stdin = child.stdin.take().ok_or_else(|| SortError::CollaboratorFailure {
            collaborator: label.clone(),
            reason: "no stdin pipe".to_string(),
        })?;
        Ok(Self {
            inner: Box::new(BufWriter::new(stdin)),
            child: Some(child),
            label,
            path: path.to_path_buf(),
        })
    }

    /// Writes one record line plus its newline terminator.
    ///
    /// # Errors
    ///
    /// A broken pipe on a child-backed writer means the encoder closed its
    /// input early and maps to [`SortError::CollaboratorFailure`]; any other
    /// write failure is [`SortError::IoFailure`].
    pub fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.write_all(line)?;
        self.write_all(b"\n")
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).map_err(|e| {
            if self.child.is_some() && e.kind() == ErrorKind::BrokenPipe {
                SortError::CollaboratorFailure {
                    collaborator: self.label.clone(),
                    reason: "closed its pipe early".to_string(),
                }
            } else {
                SortError::IoFailure { path: self.path.clone(), source: e }
            }
        })
    }

    /// Flushes, closes the encoder's input, and surfaces a nonzero exit.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::CollaboratorFailure`] if the encoder exited with
    /// a nonzero status, or [`SortError::IoFailure`] if the flush fails.
    pub fn finish(mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| SortError::IoFailure { path: self.path.clone(), source: e })?;
        let Self { inner, child, label, .. } = self;
        drop(inner); // closes the pipe so the child sees end of input
        wait_for_exit(child, &label)
    }
}

fn wait_for_exit(child: Option<Child>, label: &str) -> Result<()> {
    let Some(mut child) = child else { return Ok(()) };
    let status = child.wait().map_err(|e| SortError::CollaboratorFailure {
        collaborator: label.to_string(),
        reason: e.to_string(),
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(SortError::CollaboratorFailure {
            collaborator: label.to_string(),
            reason: status.to_string(),
        })
    }
}

/// Which external tool family handles the container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFlavor {
    /// `samtools view` / `samtools cat`
    Samtools,
    /// `sambamba view` / `sambamba merge`
    Sambamba,
}

/// Child-process collaborators over pipes.
#[derive(Debug, Clone)]
pub struct ProcessCodec {
    flavor: CodecFlavor,
    threads: usize,
    compression: u32,
    text_input: bool,
}

impl ProcessCodec {
    /// Creates a codec for the given tool family with one thread,
    /// compression level 6, and compressed input.
    #[must_use]
    pub fn new(flavor: CodecFlavor) -> Self {
        Self { flavor, threads: 1, compression: 6, text_input: false }
    }

    /// Sets the thread count passed to every collaborator invocation.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Sets the compression level passed to encoder invocations.
    #[must_use]
    pub fn compression(mut self, level: u32) -> Self {
        self.compression = level;
        self
    }

    /// Marks the input as uncompressed SAM text.
    #[must_use]
    pub fn text_input(mut self, text_input: bool) -> Self {
        self.text_input = text_input;
        self
    }

    fn tool(&self) -> &'static str {
        match self.flavor {
            CodecFlavor::Samtools => "samtools",
            CodecFlavor::Sambamba => "sambamba",
        }
    }

    fn reader_command(&self, input: &Path) -> Command {
        let mut cmd = Command::new(self.tool());
        match self.flavor {
            CodecFlavor::Samtools => {
                cmd.arg("view").arg("-h").arg("--threads").arg(self.threads.to_string());
            }
            CodecFlavor::Sambamba => {
                cmd.arg("view").arg("-h");
                if self.text_input {
                    cmd.arg("-S");
                }
                cmd.arg("--nthreads").arg(self.threads.to_string());
            }
        }
        cmd.arg(input);
        cmd
    }

    fn writer_command(&self, output: &Path) -> Command {
        let mut cmd = Command::new(self.tool());
        match self.flavor {
            CodecFlavor::Samtools => {
                cmd.arg("view")
                    .arg("-bS")
                    .arg("--threads")
                    .arg(self.threads.to_string())
                    .arg("--output-fmt-option")
                    .arg(format!("level={}", self.compression))
                    .arg("-o")
                    .arg(output)
                    .arg("-");
            }
            CodecFlavor::Sambamba => {
                cmd.arg("view")
                    .arg("-f")
                    .arg("bam")
                    .arg("-S")
                    .arg(format!("--compression-level={}", self.compression))
                    .arg("--nthreads")
                    .arg(self.threads.to_string())
                    .arg("-o")
                    .arg(output)
                    .arg("/dev/stdin");
            }
        }
        cmd
    }

    fn concat_command(&self, shards: &[PathBuf], output: &Path) -> Command {
        let mut cmd = Command::new(self.tool());
        match self.flavor {
            CodecFlavor::Samtools => {
                cmd.arg("cat").arg("-o").arg(output);
            }
            CodecFlavor::Sambamba => {
                cmd.arg("merge").arg("-t").arg(self.threads.to_string()).arg(output);
            }
        }
        cmd.args(shards);
        cmd
    }

    fn spawn(mut cmd: Command, label: &str) -> Result<Child> {
        cmd.spawn().map_err(|e| SortError::CollaboratorFailure {
            collaborator: label.to_string(),
            reason: format!("failed to start: {e}"),
        })
    }
}

impl ContainerCodec for ProcessCodec {
    fn spawn_reader(&self, input: &Path) -> Result<RecordReader> {
        let label = format!("decoder ({} view)", self.tool());
        let mut cmd = self.reader_command(input);
        cmd.stdout(Stdio::piped());
        let child = Self::spawn(cmd, &label)?;
        RecordReader::from_child(child, label, input)
    }

    fn spawn_writer(&self, output: &Path) -> Result<RecordWriter> {
        let label = format!("encoder ({} view)", self.tool());
        let mut cmd = self.writer_command(output);
        cmd.stdin(Stdio::piped());
        let child = Self::spawn(cmd, &label)?;
        RecordWriter::from_child(child, label, output)
    }

    fn concatenate(&self, shards: &[PathBuf], output: &Path) -> Result<()> {
        let label = match self.flavor {
            CodecFlavor::Samtools => "concatenator (samtools cat)".to_string(),
            CodecFlavor::Sambamba => "concatenator (sambamba merge)".to_string(),
        };
        let child = Self::spawn(self.concat_command(shards, output), &label)?;
        wait_for_exit(Some(child), &label)
    }
}

/// Plain-text collaborators over uncompressed files.
///
/// Satisfies the same byte-stream contract as [`ProcessCodec`]; concatenation
/// keeps the first shard's header block and strips the leading header lines
/// of every subsequent shard.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl TextCodec {
    fn open(path: &Path) -> Result<BufReader<File>> {
        File::open(path)
            .map(BufReader::new)
            .map_err(|e| SortError::IoFailure { path: path.to_path_buf(), source: e })
    }

    fn create(path: &Path) -> Result<BufWriter<File>> {
        File::create(path)
            .map(BufWriter::new)
            .map_err(|e| SortError::IoFailure { path: path.to_path_buf(), source: e })
    }
}

impl ContainerCodec for TextCodec {
    fn spawn_reader(&self, input: &Path) -> Result<RecordReader> {
        let reader = Self::open(input)?;
        Ok(RecordReader::from_stream(Box::new(reader), "decoder (text)".to_string(), input))
    }

    fn spawn_writer(&self, output: &Path) -> Result<RecordWriter> {
        let writer = Self::create(output)?;
        Ok(RecordWriter::from_stream(Box::new(writer), "encoder (text)".to_string(), output))
    }

    fn concatenate(&self, shards: &[PathBuf], output: &Path) -> Result<()> {
        let io_err =
            |path: &Path, e| SortError::IoFailure { path: path.to_path_buf(), source: e };

        let mut out = Self::create(output)?;
        let mut buf = Vec::new();
        for (index, shard) in shards.iter().enumerate() {
            let mut reader = Self::open(shard)?;
            let mut in_leading_header = index > 0;
            loop {
                buf.clear();
                let n = reader.read_until(b'\n', &mut buf).map_err(|e| io_err(shard, e))?;
                if n == 0 {
                    break;
                }
                if in_leading_header && buf.first() == Some(&b'@') {
                    continue;
                }
                in_leading_header = false;
                out.write_all(&buf).map_err(|e| io_err(output, e))?;
            }
        }
        out.flush().map_err(|e| io_err(output, e))
    }
}
