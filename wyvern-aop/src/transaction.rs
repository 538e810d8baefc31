//! 事务属性、回滚规则与事务管理器 SPI
//!
//! 事务管理器后端（JDBC/分布式等）不在本子系统范围内，
//! 这里只定义拦截器依赖的窄契约：按属性获取事务、提交、回滚。
//! 当前事务状态以线程绑定栈的形式对被通知的调用栈可见

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wyvern_core::{ClassDescriptor, MethodDescriptor, ThrownException};

use crate::error::AopResult;
use crate::pointcut::wildcard_match;

/// 事务传播行为
///
/// 具体语义（加入、挂起、新建）完全由事务管理器实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// 有事务就加入，没有就新建
    #[default]
    Required,

    /// 总是新建事务，挂起已有事务
    RequiresNew,

    /// 有事务就加入，没有也不新建
    Supports,

    /// 以非事务方式执行，挂起已有事务
    NotSupported,

    /// 必须已有事务，否则报错
    Mandatory,

    /// 必须没有事务，否则报错
    Never,

    /// 在嵌套事务中执行
    Nested,
}

/// 事务隔离级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Isolation {
    /// 使用后端默认隔离级别
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// 回滚规则
///
/// 按异常类型名称片段声明：rollback 为 false 即"不回滚"规则
#[derive(Debug, Clone)]
struct RollbackRule {
    pattern: String,
    rollback: bool,
}

/// 事务属性
///
/// 传播行为 + 隔离级别 + 超时 + 回滚判定。
/// 回滚规则按"最长命中模式胜出"解析；没有规则命中时默认回滚
/// （Rust 没有受检/非受检异常之分，任何错误都按需要回滚处理）
#[derive(Debug, Clone, Default)]
pub struct TransactionAttribute {
    pub propagation: Propagation,
    pub isolation: Isolation,
    pub timeout: Option<Duration>,
    rules: Vec<RollbackRule>,
}

impl TransactionAttribute {
    pub fn new(propagation: Propagation) -> Self {
        Self {
            propagation,
            ..Self::default()
        }
    }

    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 追加一条回滚规则：异常类型名称包含该模式时回滚
    pub fn rollback_for(mut self, pattern: impl Into<String>) -> Self {
        self.rules.push(RollbackRule {
            pattern: pattern.into(),
            rollback: true,
        });
        self
    }

    /// 追加一条不回滚规则：异常类型名称包含该模式时提交
    pub fn no_rollback_for(mut self, pattern: impl Into<String>) -> Self {
        self.rules.push(RollbackRule {
            pattern: pattern.into(),
            rollback: false,
        });
        self
    }

    /// 该异常是否要求回滚
    ///
    /// 在所有命中的规则（异常类型名称包含规则模式）中，
    /// 取模式最长者（最长匹配近似"最具体的规则"）；
    /// 无规则命中时默认回滚
    pub fn should_roll_back(&self, thrown: &ThrownException) -> bool {
        let mut winner: Option<&RollbackRule> = None;
        for rule in &self.rules {
            if !thrown.type_name().contains(&rule.pattern) {
                continue;
            }
            let is_longer = winner.is_none_or(|w| rule.pattern.len() > w.pattern.len());
            if is_longer {
                winner = Some(rule);
            }
        }
        winner.map_or(true, |rule| rule.rollback)
    }
}

/// 事务属性来源：为 (方法, 目标类) 解析事务属性
///
/// 返回 None 表示该方法不参与事务管理
pub trait TransactionAttributeSource: Send + Sync {
    fn attribute_for(
        &self,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
    ) -> Option<TransactionAttribute>;
}

/// 按 `Type.method*` 通配符模式登记事务属性的来源
///
/// 多条模式命中同一方法时，最长模式胜出（与回滚规则同一约定）
pub struct MethodMapTransactionAttributeSource {
    entries: Vec<(String, TransactionAttribute)>,
}

impl MethodMapTransactionAttributeSource {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// 登记一条 `Type.method*` 模式（也接受纯方法名模式）
    pub fn add(mut self, pattern: impl Into<String>, attribute: TransactionAttribute) -> Self {
        self.entries.push((pattern.into(), attribute));
        self
    }
}

impl Default for MethodMapTransactionAttributeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionAttributeSource for MethodMapTransactionAttributeSource {
    fn attribute_for(
        &self,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
    ) -> Option<TransactionAttribute> {
        let qualified = format!("{}.{}", class.name(), method.name());
        let mut winner: Option<&(String, TransactionAttribute)> = None;
        for entry in &self.entries {
            let hit = wildcard_match(&entry.0, &qualified) || wildcard_match(&entry.0, method.name());
            if !hit {
                continue;
            }
            let is_longer = winner.is_none_or(|w| entry.0.len() > w.0.len());
            if is_longer {
                winner = Some(entry);
            }
        }
        winner.map(|(_, attribute)| attribute.clone())
    }
}

struct TransactionStatusInner {
    new_transaction: bool,
    rollback_only: AtomicBool,
    completed: AtomicBool,
}

/// 事务状态句柄
///
/// 由事务管理器发出，拦截器原样传回提交/回滚调用；
/// 业务代码可以通过 [`current_transaction_status`] 拿到它并
/// 标记仅回滚
#[derive(Clone)]
pub struct TransactionStatus {
    inner: Arc<TransactionStatusInner>,
}

impl TransactionStatus {
    pub fn new(new_transaction: bool) -> Self {
        Self {
            inner: Arc::new(TransactionStatusInner {
                new_transaction,
                rollback_only: AtomicBool::new(false),
                completed: AtomicBool::new(false),
            }),
        }
    }

    /// 本次调用是否开启了新事务（而非加入已有事务）
    pub fn is_new_transaction(&self) -> bool {
        self.inner.new_transaction
    }

    /// 标记仅回滚：即使后续走到提交路径也必须回滚
    pub fn set_rollback_only(&self) {
        self.inner.rollback_only.store(true, Ordering::SeqCst);
    }

    pub fn is_rollback_only(&self) -> bool {
        self.inner.rollback_only.load(Ordering::SeqCst)
    }

    /// 由事务管理器在提交/回滚完成后标记
    pub fn mark_completed(&self) {
        self.inner.completed.store(true, Ordering::SeqCst);
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::SeqCst)
    }

    /// 同一事务状态句柄判定
    pub fn same_transaction(&self, other: &TransactionStatus) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionStatus")
            .field("new_transaction", &self.inner.new_transaction)
            .field("rollback_only", &self.is_rollback_only())
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// 事务管理器 SPI
///
/// 传播行为的全部语义在这里实现；本子系统只负责把属性交给它
/// 并在调用结束后按回滚判定选择 commit 或 rollback
pub trait PlatformTransactionManager: Send + Sync {
    /// 按属性获取事务（可能加入已有事务或新建）
    fn get_transaction(&self, attribute: &TransactionAttribute) -> AopResult<TransactionStatus>;

    /// 提交
    fn commit(&self, status: &TransactionStatus) -> AopResult<()>;

    /// 回滚
    fn rollback(&self, status: &TransactionStatus) -> AopResult<()>;
}

thread_local! {
    /// 当前线程的事务状态栈（嵌套的被通知调用各占一层）
    static TRANSACTION_STATUS_STACK: RefCell<Vec<TransactionStatus>> =
        const { RefCell::new(Vec::new()) };
}

/// 当前线程最内层被通知调用绑定的事务状态
pub fn current_transaction_status() -> Option<TransactionStatus> {
    TRANSACTION_STATUS_STACK.with(|stack| stack.borrow().last().cloned())
}

/// 事务状态线程绑定的 RAII 守卫
///
/// 构造压栈，Drop 弹栈，错误返回与 panic 展开同样恢复，
/// 外层调用绑定的状态不受内层影响
pub(crate) struct TransactionBindingGuard;

impl TransactionBindingGuard {
    pub(crate) fn bind(status: TransactionStatus) -> Self {
        TRANSACTION_STATUS_STACK.with(|stack| stack.borrow_mut().push(status));
        Self
    }
}

impl Drop for TransactionBindingGuard {
    fn drop(&mut self) {
        TRANSACTION_STATUS_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("servlet failure")]
    struct ServletException;

    #[derive(Debug, thiserror::Error)]
    #[error("generic failure")]
    struct Exception;

    #[test]
    fn test_most_specific_rule_wins() {
        // "rollback on Exception" + "no-rollback on ServletException"
        let attribute = TransactionAttribute::default()
            .rollback_for("Exception")
            .no_rollback_for("ServletException");

        // ServletException 的类型名同时命中两条，较长的不回滚规则胜出
        assert!(!attribute.should_roll_back(&ThrownException::new(ServletException)));
        // 普通 Exception 只命中回滚规则
        assert!(attribute.should_roll_back(&ThrownException::new(Exception)));
    }

    #[test]
    fn test_default_policy_rolls_back() {
        let attribute = TransactionAttribute::default();
        assert!(attribute.should_roll_back(&ThrownException::new(Exception)));
    }

    #[test]
    fn test_no_matching_rule_falls_back_to_rollback() {
        let attribute = TransactionAttribute::default().no_rollback_for("Timeout");
        assert!(attribute.should_roll_back(&ThrownException::new(Exception)));
    }

    #[test]
    fn test_method_map_longest_pattern_wins() {
        let source = MethodMapTransactionAttributeSource::new()
            .add("AccountService.*", TransactionAttribute::new(Propagation::Supports))
            .add(
                "AccountService.transfer*",
                TransactionAttribute::new(Propagation::RequiresNew),
            );

        let class = ClassDescriptor::new("AccountService").with_method("transfer_funds");
        let attribute = source
            .attribute_for(&MethodDescriptor::new("transfer_funds"), &class)
            .unwrap();
        assert_eq!(attribute.propagation, Propagation::RequiresNew);

        let other = source
            .attribute_for(&MethodDescriptor::new("close"), &class)
            .unwrap();
        assert_eq!(other.propagation, Propagation::Supports);
    }

    #[test]
    fn test_unmapped_method_is_non_transactional() {
        let source = MethodMapTransactionAttributeSource::new()
            .add("AccountService.*", TransactionAttribute::default());
        let class = ClassDescriptor::new("AuditService").with_method("log");
        assert!(source
            .attribute_for(&MethodDescriptor::new("log"), &class)
            .is_none());
    }

    #[test]
    fn test_status_binding_stack_restores() {
        assert!(current_transaction_status().is_none());
        let outer = TransactionStatus::new(true);
        {
            let _outer_guard = TransactionBindingGuard::bind(outer.clone());
            let bound = current_transaction_status().unwrap();
            assert!(bound.same_transaction(&outer));

            let inner = TransactionStatus::new(false);
            {
                let _inner_guard = TransactionBindingGuard::bind(inner.clone());
                assert!(current_transaction_status().unwrap().same_transaction(&inner));
            }
            // 内层退出后外层状态复原
            assert!(current_transaction_status().unwrap().same_transaction(&outer));
        }
        assert!(current_transaction_status().is_none());
    }

    #[test]
    fn test_rollback_only_flag() {
        let status = TransactionStatus::new(true);
        assert!(!status.is_rollback_only());
        status.set_rollback_only();
        assert!(status.is_rollback_only());
    }
}
