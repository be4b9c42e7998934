/// 精度处理工具
///
/// 数量/价格按交易所最小变动单位取整，使用 Decimal 计算避免浮点误差
/// （例如 0.3 / 0.1 = 2.9999999999999996）。
use crate::core::types::OrderSide;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

fn to_decimal_pair(value: f64, step: f64) -> Option<(Decimal, Decimal)> {
    // 先截掉浮点尾差，再按步长取整
    let v = Decimal::from_f64(value)?.round_dp(12);
    let s = Decimal::from_f64(step)?;
    if s.is_zero() {
        return None;
    }
    Some((v, s))
}

/// 向下取整到步长
pub fn floor_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 || !value.is_finite() {
        return value;
    }
    match to_decimal_pair(value, step) {
        Some((v, s)) => ((v / s).floor() * s)
            .to_f64()
            .unwrap_or_else(|| (value / step).floor() * step),
        None => (value / step).floor() * step,
    }
}

/// 向上取整到步长
pub fn ceil_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 || !value.is_finite() {
        return value;
    }
    match to_decimal_pair(value, step) {
        Some((v, s)) => ((v / s).ceil() * s)
            .to_f64()
            .unwrap_or_else(|| (value / step).ceil() * step),
        None => (value / step).ceil() * step,
    }
}

/// 挂单价格取整：买单向下、卖单向上，保证不比目标价更激进
pub fn round_price_for_side(price: f64, tick_size: f64, side: OrderSide) -> f64 {
    match side {
        OrderSide::Buy => floor_to_step(price, tick_size),
        OrderSide::Sell => ceil_to_step(price, tick_size),
    }
}
