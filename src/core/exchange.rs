use crate::core::types::*;
use async_trait::async_trait;

/// 交易所执行网关
///
/// 做市循环只依赖这几个动作：查询交易对精度、市价单、限价单、撤单、全撤。
/// 行情与账户数据由交易所实现异步写入共享状态（见 `core::state`）。
#[async_trait]
pub trait Exchange: Send + Sync {
    /// 获取交易所名称
    fn name(&self) -> &str;

    /// 获取交易对精度信息
    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo>;

    /// 下市价单
    async fn place_market_order(&self, symbol: &str, side: OrderSide, amount: f64)
        -> Result<Order>;

    /// 下限价单
    async fn place_limit_order(&self, request: OrderRequest) -> Result<Order>;

    /// 取消订单
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()>;

    /// 取消交易对所有挂单，返回交易所确认撤销的数量
    async fn cancel_all_orders(&self, symbol: &str) -> Result<usize>;
}
