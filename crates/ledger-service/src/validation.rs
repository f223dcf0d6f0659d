//! 订单号校验
//!
//! Luhn（模 10）校验算法：从右向左，每隔一位将数字翻倍，
//! 翻倍结果大于 9 时减去 9（即各位数字之和），全部求和后能被 10 整除即为有效。

/// 校验订单号
///
/// 任何非 ASCII 数字字符都直接判定为无效。空字符串的和为 0，按规则判定为有效，
/// 调用方在进入校验前必须先拒绝空输入。
pub fn is_valid_order_number(number: &str) -> bool {
    let mut sum: u32 = 0;

    for (position, ch) in number.chars().rev().enumerate() {
        let Some(digit) = ch.to_digit(10) else {
            return false;
        };

        sum += if position % 2 == 1 {
            let doubled = digit * 2;
            if doubled > 9 { doubled - 9 } else { doubled }
        } else {
            digit
        };
    }

    sum % 10 == 0
}
