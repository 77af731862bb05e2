/// 3-bit 字母表：{0:A, 1:C, 2:G, 3:T, 4:N, 5:|}，6/7 预留给扩展符号。
pub const ENC_A: u8 = 0;
pub const ENC_C: u8 = 1;
pub const ENC_G: u8 = 2;
pub const ENC_T: u8 = 3;
pub const ENC_N: u8 = 4;
/// contig 分隔符
pub const ENC_SEP: u8 = 5;

/// 邻域搜索展开的字母数（仅 A/C/G/T）
pub const DNA_RANGE: u8 = 4;
/// 3 bit 可编码的符号总数
pub const ENC_RANGE: u8 = 8;

#[inline]
pub fn encode(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        b'A' => ENC_A,
        b'C' => ENC_C,
        b'G' => ENC_G,
        b'T' | b'U' => ENC_T,
        b'|' => ENC_SEP,
        _ => ENC_N, // map others to N
    }
}

#[inline]
pub fn decode(enc: u8) -> u8 {
    match enc {
        ENC_A => b'A',
        ENC_C => b'C',
        ENC_G => b'G',
        ENC_T => b'T',
        ENC_SEP => b'|',
        _ => b'N',
    }
}

#[inline]
pub fn is_canonical(enc: u8) -> bool {
    enc < DNA_RANGE
}

pub fn normalize_seq(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq {
        let up = b.to_ascii_uppercase();
        let nb = match up {
            b'A' | b'C' | b'G' | b'T' | b'N' => up,
            b'U' => b'T',
            _ => b'N',
        };
        out.push(nb);
    }
    out
}

/// ASCII 序列 -> 编码序列
pub fn encode_seq(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| encode(b)).collect()
}

/// 编码域互补：A<->T, C<->G，N 与分隔符保持不变
#[inline]
pub fn complement_enc(enc: u8) -> u8 {
    match enc {
        ENC_A => ENC_T,
        ENC_C => ENC_G,
        ENC_G => ENC_C,
        ENC_T => ENC_A,
        other => other,
    }
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        _ => b'N',
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq.iter().rev() {
        out.push(complement(b));
    }
    out
}

pub fn revcomp_enc(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&e| complement_enc(e)).collect()
}
