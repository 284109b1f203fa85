//! Simple CSV files: one `phrase\tfrequency` record per line
//!
//! In these files, every line (`\n`) contains a phrase followed by a single
//! tab (`\t`) followed by the frequency of that phrase. There may be duplicate
//! phrases. A phrase is a non-empty list of words each separated by a single
//! space with no leading or trailing spaces:
//!
//! ```text
//! hello world	20
//! i love you	100
//! hello world	5
//! ```

use super::BoxedInput;
use crate::{record::PhraseRecord, Frequency};
use anyhow::Context;
use std::{num::NonZeroU64, path::Path};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufWriter},
};

/// Reader for simple CSV files
///
/// A line with the wrong tab count, a non-numeric or zero frequency, or an
/// empty phrase is skipped with a warning rather than aborting the file: the
/// most it can cost is that one line, while rejecting the file would silently
/// drop every record after it.
pub struct SimpleCsvReader {
    input: BoxedInput,
    line: String,
}
//
impl SimpleCsvReader {
    /// Wrap decompressed input bytes
    pub fn new(input: BoxedInput) -> Self {
        Self {
            input,
            line: String::new(),
        }
    }

    /// Next record, or `None` at end of input
    pub async fn next_record(&mut self) -> crate::Result<Option<PhraseRecord>> {
        loop {
            self.line.clear();
            let bytes_read = self
                .input
                .read_line(&mut self.line)
                .await
                .context("reading a simple CSV line")?;
            if bytes_read == 0 {
                return Ok(None);
            }
            let line = self.line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Some(record) => return Ok(Some(record)),
                None => log::warn!("skipping malformed simple CSV line {line:?}"),
            }
        }
    }
}

/// Decode one simple CSV line, or `None` if it is malformed
///
/// We know that a valid line contains exactly one `\t`, so instead of
/// splitting we locate that tab and check that no second one follows. The
/// first tab cannot be at position 0 because the phrase cannot be the empty
/// string.
fn parse_line(line: &str) -> Option<PhraseRecord> {
    let first_tab = line.find('\t')?;
    if first_tab == 0 {
        return None;
    }
    let (phrase, rest) = line.split_at(first_tab);
    let rest = &rest[1..];
    if rest.contains('\t') {
        return None;
    }
    let frequency = rest.parse::<u64>().ok().and_then(NonZeroU64::new)?;
    Some(PhraseRecord::from_parts(phrase.into(), frequency))
}

/// Writer for simple CSV files
///
/// The output of this writer is what the downstream index builder consumes,
/// so this is the one and only output format of the engine.
#[derive(Debug)]
pub struct SimpleCsvWriter<W> {
    output: W,
}
//
impl SimpleCsvWriter<BufWriter<File>> {
    /// Create a new output file
    pub async fn create(path: &Path) -> crate::Result<Self> {
        let file = File::create(path)
            .await
            .with_context(|| format!("creating output file {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}
//
impl<W: AsyncWrite + Unpin> SimpleCsvWriter<W> {
    /// Wrap an output byte sink
    pub fn new(output: W) -> Self {
        Self { output }
    }

    /// Append one record
    pub async fn write(&mut self, phrase: &str, frequency: Frequency) -> crate::Result<()> {
        let line = format!("{phrase}\t{frequency}\n");
        self.output
            .write_all(line.as_bytes())
            .await
            .context("writing a simple CSV record")
    }

    /// Flush buffered records and release the writer
    pub async fn finish(mut self) -> crate::Result<()> {
        self.output
            .flush()
            .await
            .context("flushing a simple CSV output file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader_over(text: &str) -> SimpleCsvReader {
        SimpleCsvReader::new(Box::new(Cursor::new(text.as_bytes().to_owned())))
    }

    #[tokio::test]
    async fn reads_valid_records() {
        let mut reader = reader_over("hello world\t20\ni love you\t100\nhello world\t5\n");
        let mut records = Vec::new();
        while let Some(record) = reader.next_record().await.unwrap() {
            records.push((record.phrase().to_owned(), record.frequency().get()));
        }
        assert_eq!(
            records,
            vec![
                ("hello world".to_owned(), 20),
                ("i love you".to_owned(), 100),
                ("hello world".to_owned(), 5),
            ]
        );
    }

    #[tokio::test]
    async fn skips_malformed_lines() {
        let text = "good\t1\n\
                    no tab here\n\
                    two\ttabs\t3\n\
                    \t5\n\
                    zero\t0\n\
                    not a number\tmany\n\
                    also good\t2\n";
        let mut reader = reader_over(text);
        let mut records = Vec::new();
        while let Some(record) = reader.next_record().await.unwrap() {
            records.push(record.phrase().to_owned());
        }
        assert_eq!(records, vec!["good", "also good"]);
    }

    #[tokio::test]
    async fn roundtrips_through_writer() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = SimpleCsvWriter::new(&mut buffer);
            writer
                .write("hello world", NonZeroU64::new(20).unwrap())
                .await
                .unwrap();
            writer
                .write("foo", NonZeroU64::new(7).unwrap())
                .await
                .unwrap();
            writer.finish().await.unwrap();
        }
        assert_eq!(buffer.into_inner(), b"hello world\t20\nfoo\t7\n");
    }
}
