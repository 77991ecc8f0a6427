use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tracing::debug;

use super::{SinkError, TupleSink};
use crate::types::{Schema, Tuple, Value};

/// Record format of a [FileSink]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// One line per tuple, fields separated by tabs, preceded by a header line of field names
    Tsv,
    /// One MessagePack map per tuple
    MessagePack,
}

/// Writes all tuples of a stream to a file.
///
/// The file is created (or truncated) when the first tuple of a run arrives, or at the end of
/// a run which produced no tuples. Building a pipeline never touches the file system.
pub struct FileSink {
    path: PathBuf,
    format: FileFormat,
    header: Vec<String>,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Write records of the given format to `path`
    pub fn new(path: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            path: path.into(),
            format,
            header: Vec::new(),
            writer: None,
        }
    }

    /// Tab separated text file
    pub fn tsv(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FileFormat::Tsv)
    }

    /// MessagePack encoded file
    pub fn message_pack(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FileFormat::MessagePack)
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, SinkError> {
        if self.writer.is_none() {
            debug!(path = ?self.path, "creating output file");
            let mut writer = BufWriter::new(File::create(&self.path)?);
            if self.format == FileFormat::Tsv {
                writeln!(writer, "{}", self.header.join("\t"))?;
            }
            self.writer = Some(writer);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| SinkError::Invalid("output file is not open".to_owned()))
    }
}

/// Render a value for a tab separated line
fn tsv_field(value: &Value) -> String {
    value
        .to_string()
        .replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
}

impl TupleSink for FileSink {
    fn validate(&mut self, _name: &str, schema: &Schema) -> Result<(), SinkError> {
        self.header = schema.names().map(str::to_owned).collect();
        Ok(())
    }

    fn start(&mut self) -> Result<(), SinkError> {
        // a failed run leaves its file open
        self.writer = None;
        Ok(())
    }

    fn write(&mut self, tuple: Tuple) -> Result<(), SinkError> {
        let format = self.format;
        let writer = self.writer()?;
        match format {
            FileFormat::Tsv => {
                let line: Vec<String> = tuple.values().map(tsv_field).collect();
                writeln!(writer, "{}", line.join("\t"))?;
            }
            FileFormat::MessagePack => rmp_serde::encode::write_named(writer, &tuple)?,
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer()?.flush()?;
        self.writer = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::errorhandling::OperatorError;
    use crate::operators::*;
    use crate::slice::{Cell, Slice};
    use crate::sources::TupleSource;
    use crate::stream::Pipeline;
    use crate::testing::numbers;
    use crate::tuple;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tuplestream-{}-{name}", std::process::id()))
    }

    #[test]
    fn writes_tsv() {
        let path = temp_path("plays.tsv");
        let source = TupleSource::infer(vec![
            tuple! {"user" => "a\tb", "plays" => Slice::new([Cell::new(1, 2i64)])},
            tuple! {"user" => "c", "plays" => Slice::empty()},
        ]);
        Pipeline::new()
            .source("plays", source)
            .unwrap()
            .write("file", FileSink::tsv(&path))
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(content, "user\tplays\na\\tb\t[2]\nc\t[]\n");
    }

    #[test]
    fn empty_run_writes_header() {
        let path = temp_path("empty.tsv");
        let schema = Schema::new().with("a", crate::types::ValueType::Int);
        let source = TupleSource::new(schema, vec![]);
        Pipeline::new()
            .source("empty", source)
            .unwrap()
            .write("file", FileSink::tsv(&path))
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(content, "a\n");
    }

    #[test]
    fn rerun_after_failure_truncates() {
        let path = temp_path("rerun.tsv");
        let failed = Arc::new(AtomicBool::new(false));
        let pipeline = Pipeline::new();
        let fail_once = Arc::clone(&failed);
        pipeline
            .source("numbers", numbers(3))
            .unwrap()
            .filter("fails-once", "n", move |n: i64| -> Result<bool, OperatorError> {
                if n == 2 && !fail_once.swap(true, Ordering::SeqCst) {
                    Err("first run fails".into())
                } else {
                    Ok(true)
                }
            })
            .unwrap()
            .sink("file", FileSink::tsv(&path))
            .unwrap();

        assert!(pipeline.run().is_err());
        pipeline.run().unwrap();
        let content = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(content, "n\n0\n1\n2\n");
    }

    #[test]
    fn writes_message_pack() {
        let path = temp_path("plays.msgpack");
        let tuples = vec![tuple! {"a" => 1i64, "b" => "x"}, tuple! {"a" => 2i64, "b" => "y"}];
        Pipeline::new()
            .source("t", TupleSource::infer(tuples.clone()))
            .unwrap()
            .write("file", FileSink::message_pack(&path))
            .unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let mut reader = Cursor::new(bytes);
        let decoded: Vec<Tuple> = (0..2)
            .map(|_| rmp_serde::decode::from_read(&mut reader).unwrap())
            .collect();
        assert_eq!(decoded, tuples);
    }
}
