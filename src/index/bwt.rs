/// 根据后缀数组构建 BWT，同时返回终止符 `$` 所在的行号。
pub fn build_bwt(text: &[u8], sa: &[u32]) -> (Vec<u8>, usize) {
    let n = text.len();
    let mut bwt = Vec::with_capacity(n);
    let mut primary = 0usize;
    for (row, &p) in sa.iter().enumerate() {
        let i = p as usize;
        if i == 0 {
            primary = row;
            bwt.push(text[n - 1]);
        } else {
            bwt.push(text[i - 1]);
        }
    }
    (bwt, primary)
}
