use anyhow::{bail, Context, Result};
use std::io::BufRead;

use crate::util::dna;

/// 参考序列记录；序列已规范化为 `ACGTN`
#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

/// 拆分 `>id desc` / `@id desc` 形式的头部
pub(crate) fn split_header(header: &str) -> (String, Option<String>) {
    let mut parts = header.trim().splitn(2, char::is_whitespace);
    let id = parts.next().unwrap_or("").to_string();
    let desc = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    (id, desc)
}

pub struct FastaReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    peek_header: Option<String>,
    line_no: u64,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false, peek_header: None, line_no: 0 }
    }

    fn read_line(&mut self) -> Result<usize> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf).with_context(|| format!("reading FASTA line {}", self.line_no + 1))?;
        if n > 0 {
            self.line_no += 1;
        }
        Ok(n)
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        if self.done {
            return Ok(None);
        }

        let header = match self.peek_header.take() {
            Some(h) => h,
            None => loop {
                if self.read_line()? == 0 {
                    self.done = true;
                    return Ok(None);
                }
                let line = self.buf.trim();
                if let Some(h) = line.strip_prefix('>') {
                    break h.to_string();
                }
                if !line.is_empty() {
                    bail!("FASTA line {}: sequence data before the first header", self.line_no);
                }
            },
        };
        let (id, desc) = split_header(&header);

        let mut seq: Vec<u8> = Vec::new();
        loop {
            if self.read_line()? == 0 {
                self.done = true;
                break;
            }
            if let Some(h) = self.buf.strip_prefix('>') {
                self.peek_header = Some(h.trim().to_string());
                break;
            }
            seq.extend(self.buf.bytes().filter(|b| !b.is_ascii_whitespace()));
        }

        Ok(Some(FastaRecord { id, desc, seq: dna::normalize_seq(&seq) }))
    }
}

/// 读入整个参考文件，得到 `(名称, 序列)` 列表
pub fn read_reference(path: &str) -> Result<Vec<(String, Vec<u8>)>> {
    let fh = std::fs::File::open(path).with_context(|| format!("cannot open reference FASTA '{}'", path))?;
    let mut reader = FastaReader::new(std::io::BufReader::new(fh));
    let mut records = Vec::new();
    while let Some(rec) = reader.next_record()? {
        records.push((rec.id, rec.seq));
    }
    if records.is_empty() {
        bail!("FASTA file '{}' contains no sequences", path);
    }
    Ok(records)
}
