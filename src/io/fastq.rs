use anyhow::{anyhow, bail, Result};
use std::io::BufRead;

use super::fasta::split_header;

/// 双端数据中 read 属于哪一端（由 `/1`、`/2` 后缀识别）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndInfo {
    Single,
    End1,
    End2,
}

/// 待比对的 read；FASTA 输入时没有质量值
#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub tag: String,
    pub end: EndInfo,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

fn strip_end_suffix(id: String) -> (String, EndInfo) {
    if let Some(tag) = id.strip_suffix("/1") {
        (tag.to_string(), EndInfo::End1)
    } else if let Some(tag) = id.strip_suffix("/2") {
        (tag.to_string(), EndInfo::End2)
    } else {
        (id, EndInfo::Single)
    }
}

/// 单行序列的 FASTQ / FASTA read 读取器，格式按每条记录的首字符判断
pub struct ReadReader<R: BufRead> {
    reader: R,
    buf: String,
    line_no: u64,
}

impl<R: BufRead> ReadReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), line_no: 0 }
    }

    fn next_line(&mut self) -> Result<bool> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf)?;
        if n > 0 {
            self.line_no += 1;
        }
        Ok(n > 0)
    }

    fn expect_line(&mut self, what: &str) -> Result<String> {
        if !self.next_line()? {
            bail!("unexpected EOF at line {}: missing {}", self.line_no + 1, what);
        }
        Ok(self.buf.trim_end().to_string())
    }

    pub fn next_record(&mut self) -> Result<Option<ReadRecord>> {
        // skip blank lines between records
        loop {
            if !self.next_line()? {
                return Ok(None);
            }
            if !self.buf.trim().is_empty() {
                break;
            }
        }
        let header_line = self.buf.trim_end().to_string();
        let (with_qualities, header) = if let Some(h) = header_line.strip_prefix('@') {
            (true, h)
        } else if let Some(h) = header_line.strip_prefix('>') {
            (false, h)
        } else {
            return Err(anyhow!("line {}: read header must start with '@' or '>'", self.line_no));
        };
        let (id, _desc) = split_header(header);
        let (tag, end) = strip_end_suffix(id);

        let seq = self.expect_line("sequence")?.into_bytes();
        let qual = if with_qualities {
            let plus = self.expect_line("'+' line")?;
            if !plus.starts_with('+') {
                bail!("line {}: missing '+' line", self.line_no);
            }
            let qual = self.expect_line("quality line")?.into_bytes();
            if qual.len() != seq.len() {
                bail!("line {}: sequence/quality length mismatch ({} vs {})", self.line_no, seq.len(), qual.len());
            }
            Some(qual)
        } else {
            None
        };
        Ok(Some(ReadRecord { tag, end, seq, qual }))
    }
}
