//! 输入输出：FASTA / FASTQ 解析与 MAP 格式输出。

pub mod fasta;
pub mod fastq;
pub mod map;
