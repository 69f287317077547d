/// 向上取整除法
pub const fn div_round_up(x: u32, step: u32) -> u32 {
    (x + step - 1) / step
}

/// 把 `value` 按 bincode 定长小端编码写入 `buf` 开头
pub fn encode_into<T: serde::Serialize>(buf: &mut [u8], value: &T) -> bincode::Result<()> {
    bincode::serialize_into(buf, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_only_on_remainder() {
        assert_eq!(div_round_up(4096, 4096), 1);
        assert_eq!(div_round_up(4097, 4096), 2);
        assert_eq!(div_round_up(1, 512), 1);
    }
}
