//! 事务拦截器
//!
//! 一次被通知调用上的状态机：
//! 解析事务属性（无属性 → 完全不做事务管理）→ 获取事务并线程绑定
//! → 推进链 → 按结果与回滚判定选择提交或回滚。
//! 状态绑定由 RAII 守卫保证在异常路径同样复原；
//! 提交失败后的补偿回滚不允许吞掉原始提交错误（必须留痕）

use std::sync::Arc;

use wyvern_core::{ClassDescriptor, MethodDescriptor, ReturnValue};

use crate::advice::MethodInterceptor;
use crate::advisor::Advisor;
use crate::error::AopResult;
use crate::invocation::MethodInvocation;
use crate::pointcut::{true_class_filter, MethodMatcher, Pointcut};
use crate::transaction::{
    PlatformTransactionManager, TransactionAttributeSource, TransactionBindingGuard,
    TransactionStatus,
};

/// 事务拦截器
pub struct TransactionInterceptor {
    manager: Arc<dyn PlatformTransactionManager>,
    source: Arc<dyn TransactionAttributeSource>,
}

impl TransactionInterceptor {
    pub fn new(
        manager: Arc<dyn PlatformTransactionManager>,
        source: Arc<dyn TransactionAttributeSource>,
    ) -> Self {
        Self { manager, source }
    }

    /// 提交；提交失败时尝试补偿回滚
    ///
    /// 补偿回滚成功 → 向上抛原始提交错误；
    /// 补偿回滚也失败 → 抛回滚错误，但原始提交错误必须留痕
    fn commit_with_recovery(&self, status: &TransactionStatus) -> AopResult<()> {
        if status.is_rollback_only() {
            tracing::debug!("Transaction marked rollback-only, rolling back instead of commit");
            return self.manager.rollback(status);
        }
        match self.manager.commit(status) {
            Ok(()) => Ok(()),
            Err(commit_error) => {
                tracing::error!(
                    "Commit failed, attempting compensating rollback: {}",
                    commit_error
                );
                match self.manager.rollback(status) {
                    Ok(()) => Err(commit_error),
                    Err(rollback_error) => {
                        tracing::error!(
                            "Compensating rollback also failed; original commit failure: {}",
                            commit_error
                        );
                        Err(rollback_error)
                    }
                }
            }
        }
    }
}

impl MethodInterceptor for TransactionInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation) -> AopResult<ReturnValue> {
        // 1. 解析事务属性；None 意味着该方法不参与事务管理
        let Some(attribute) = self
            .source
            .attribute_for(invocation.method(), invocation.target_class())
        else {
            return invocation.proceed();
        };

        // 2. 按传播行为获取事务（加入或新建由管理器决定）并线程绑定，
        //    守卫保证本次调用结束后复原先前的绑定
        let status = self.manager.get_transaction(&attribute)?;
        tracing::debug!(
            "Transaction {} for {}",
            if status.is_new_transaction() { "started" } else { "joined" },
            invocation.signature()
        );
        let _binding = TransactionBindingGuard::bind(status.clone());

        // 3. 推进链 / 调用目标
        match invocation.proceed() {
            // 5. 成功路径：提交
            Ok(value) => {
                self.commit_with_recovery(&status)?;
                Ok(value)
            }
            // 4. 异常路径：按回滚判定选择回滚或提交，原异常继续向上抛
            Err(error) => {
                let roll_back = match error.thrown_exception() {
                    Some(thrown) => attribute.should_roll_back(thrown),
                    // 基础设施错误不在规则体系内，一律回滚
                    None => true,
                };
                if roll_back || status.is_rollback_only() {
                    tracing::debug!("Rolling back transaction for {}", invocation.signature());
                    if let Err(rollback_error) = self.manager.rollback(&status) {
                        // 回滚自身失败：新错误向上抛，原始异常必须留痕
                        tracing::error!(
                            "Rollback failed; original application exception: {}",
                            error
                        );
                        return Err(rollback_error);
                    }
                    Err(error)
                } else {
                    // 规则豁免回滚的应用异常：照常提交
                    tracing::debug!(
                        "Exception excluded from rollback, committing transaction for {}",
                        invocation.signature()
                    );
                    if let Err(commit_error) = self.commit_with_recovery(&status) {
                        tracing::error!(
                            "Commit failed after policy-excluded exception; original exception: {}",
                            error
                        );
                        return Err(commit_error);
                    }
                    Err(error)
                }
            }
        }
    }

    fn name(&self) -> &str {
        "TransactionInterceptor"
    }
}

/// 只命中"有事务属性的方法"的方法匹配器
struct TransactionAttributeSourceMatcher {
    source: Arc<dyn TransactionAttributeSource>,
}

impl MethodMatcher for TransactionAttributeSourceMatcher {
    fn matches(&self, method: &MethodDescriptor, class: &ClassDescriptor) -> bool {
        self.source.attribute_for(method, class).is_some()
    }
}

/// 事务切点：只对能解析出事务属性的方法生效
pub fn transaction_pointcut(source: Arc<dyn TransactionAttributeSource>) -> Pointcut {
    Pointcut::new(
        true_class_filter(),
        Arc::new(TransactionAttributeSourceMatcher { source }),
    )
}

/// 事务 Advisor：事务切点 + 事务拦截器
pub fn transaction_advisor(
    manager: Arc<dyn PlatformTransactionManager>,
    source: Arc<dyn TransactionAttributeSource>,
) -> Advisor {
    let interceptor = TransactionInterceptor::new(manager, Arc::clone(&source));
    Advisor::interception(transaction_pointcut(source), Arc::new(interceptor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AopError;
    use crate::proxy::ProxyFactory;
    use crate::transaction::{
        current_transaction_status, MethodMapTransactionAttributeSource, Propagation,
        TransactionAttribute,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use wyvern_core::{
        ArgValue, InterfaceDescriptor, Invocable, InvokeError, InvokeResult,
    };

    #[derive(Debug, thiserror::Error)]
    #[error("servlet failure")]
    struct ServletException;

    #[derive(Debug, thiserror::Error)]
    #[error("generic failure")]
    struct Exception;

    /// 记录提交/回滚的事务管理器
    struct RecordingManager {
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        fail_commit: AtomicBool,
        fail_rollback: AtomicBool,
    }

    impl RecordingManager {
        fn new() -> Self {
            Self {
                commits: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
                fail_commit: AtomicBool::new(false),
                fail_rollback: AtomicBool::new(false),
            }
        }
    }

    impl PlatformTransactionManager for RecordingManager {
        fn get_transaction(
            &self,
            _attribute: &TransactionAttribute,
        ) -> AopResult<TransactionStatus> {
            Ok(TransactionStatus::new(true))
        }

        fn commit(&self, status: &TransactionStatus) -> AopResult<()> {
            if self.fail_commit.load(Ordering::SeqCst) {
                return Err(AopError::Transaction("commit failed".to_string()));
            }
            self.commits.fetch_add(1, Ordering::SeqCst);
            status.mark_completed();
            Ok(())
        }

        fn rollback(&self, status: &TransactionStatus) -> AopResult<()> {
            if self.fail_rollback.load(Ordering::SeqCst) {
                return Err(AopError::Transaction("rollback failed".to_string()));
            }
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            status.mark_completed();
            Ok(())
        }
    }

    fn banking_interface() -> Arc<InterfaceDescriptor> {
        Arc::new(
            InterfaceDescriptor::new("Banking")
                .with_method("deposit")
                .with_method("fail_with_servlet")
                .with_method("fail_with_generic")
                .with_method("observe_status")
                .with_method("untransactional"),
        )
    }

    fn banking_class() -> Arc<ClassDescriptor> {
        Arc::new(ClassDescriptor::new("BankingService").with_interface(banking_interface()))
    }

    struct BankingService;
    impl Invocable for BankingService {
        fn class(&self) -> Arc<ClassDescriptor> {
            banking_class()
        }
        fn invoke(&self, method: &str, _args: &[ArgValue]) -> InvokeResult {
            match method {
                "deposit" => Ok(Arc::new(100_i64)),
                "fail_with_servlet" => Err(InvokeError::thrown(ServletException)),
                "fail_with_generic" => Err(InvokeError::thrown(Exception)),
                "observe_status" => {
                    // 事务状态必须对被通知调用内的代码可见
                    let status = current_transaction_status()
                        .expect("transaction status must be bound during advised call");
                    Ok(Arc::new(status.is_new_transaction()))
                }
                "untransactional" => {
                    assert!(current_transaction_status().is_none());
                    Ok(Arc::new(()))
                }
                other => Err(InvokeError::no_such_method(&self.class(), other)),
            }
        }
    }

    fn transactional_source() -> Arc<MethodMapTransactionAttributeSource> {
        // untransactional 之外的方法都有事务属性，
        // 回滚规则：Exception 回滚，但 ServletException 豁免
        let attribute = TransactionAttribute::new(Propagation::Required)
            .rollback_for("Exception")
            .no_rollback_for("ServletException");
        Arc::new(
            MethodMapTransactionAttributeSource::new()
                .add("BankingService.deposit", attribute.clone())
                .add("BankingService.fail*", attribute.clone())
                .add("BankingService.observe_status", attribute),
        )
    }

    fn proxied_banking(
        manager: &Arc<RecordingManager>,
    ) -> Arc<crate::proxy::AopProxy> {
        let manager: Arc<dyn PlatformTransactionManager> = Arc::clone(manager) as _;
        let mut factory = ProxyFactory::for_target(Arc::new(BankingService));
        factory.add_advisor(transaction_advisor(manager, transactional_source()));
        factory.build().unwrap()
    }

    #[test]
    fn test_successful_invocation_commits() {
        let manager = Arc::new(RecordingManager::new());
        let proxy = proxied_banking(&manager);

        let result = proxy.call("deposit", vec![]).unwrap();
        assert_eq!(result.downcast_ref::<i64>(), Some(&100));
        assert_eq!(manager.commits.load(Ordering::SeqCst), 1);
        assert_eq!(manager.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rollback_rule_specificity() {
        let manager = Arc::new(RecordingManager::new());
        let proxy = proxied_banking(&manager);

        // ServletException 被更具体的不回滚规则豁免 → 提交
        let error = proxy.call("fail_with_servlet", vec![]).unwrap_err();
        assert!(error.thrown_exception().is_some());
        assert_eq!(manager.commits.load(Ordering::SeqCst), 1);
        assert_eq!(manager.rollbacks.load(Ordering::SeqCst), 0);

        // 普通 Exception 命中回滚规则 → 回滚
        let error = proxy.call("fail_with_generic", vec![]).unwrap_err();
        assert!(error.thrown_exception().is_some());
        assert_eq!(manager.commits.load(Ordering::SeqCst), 1);
        assert_eq!(manager.rollbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_status_visible_inside_advised_call_and_unbound_after() {
        let manager = Arc::new(RecordingManager::new());
        let proxy = proxied_banking(&manager);

        assert!(current_transaction_status().is_none());
        let result = proxy.call("observe_status", vec![]).unwrap();
        assert_eq!(result.downcast_ref::<bool>(), Some(&true));
        // 调用结束后绑定复原
        assert!(current_transaction_status().is_none());
    }

    #[test]
    fn test_binding_restored_after_exception() {
        let manager = Arc::new(RecordingManager::new());
        let proxy = proxied_banking(&manager);

        proxy.call("fail_with_generic", vec![]).unwrap_err();
        assert!(current_transaction_status().is_none());
    }

    #[test]
    fn test_method_without_attribute_skips_transaction_management() {
        let manager = Arc::new(RecordingManager::new());
        let proxy = proxied_banking(&manager);

        proxy.call("untransactional", vec![]).unwrap();
        assert_eq!(manager.commits.load(Ordering::SeqCst), 0);
        assert_eq!(manager.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rollback_failure_surfaces_new_error() {
        let manager = Arc::new(RecordingManager::new());
        manager.fail_rollback.store(true, Ordering::SeqCst);
        let proxy = proxied_banking(&manager);

        let error = proxy.call("fail_with_generic", vec![]).unwrap_err();
        // 回滚失败的错误向上抛（原应用异常已留痕于日志）
        assert!(matches!(error, AopError::Transaction(_)));
    }

    #[test]
    fn test_commit_failure_triggers_compensating_rollback() {
        let manager = Arc::new(RecordingManager::new());
        manager.fail_commit.store(true, Ordering::SeqCst);
        let proxy = proxied_banking(&manager);

        let error = proxy.call("deposit", vec![]).unwrap_err();
        // 补偿回滚成功 → 原始提交错误向上抛
        assert!(matches!(error, AopError::Transaction(_)));
        assert_eq!(manager.rollbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rollback_only_forces_rollback_on_success_path() {
        struct MarkingService;
        impl Invocable for MarkingService {
            fn class(&self) -> Arc<ClassDescriptor> {
                Arc::new(
                    ClassDescriptor::new("BankingService")
                        .with_interface(Arc::new(
                            InterfaceDescriptor::new("Marking").with_method("deposit"),
                        )),
                )
            }
            fn invoke(&self, method: &str, _args: &[ArgValue]) -> InvokeResult {
                match method {
                    "deposit" => {
                        current_transaction_status()
                            .expect("status must be bound")
                            .set_rollback_only();
                        Ok(Arc::new(()))
                    }
                    other => Err(InvokeError::no_such_method(&self.class(), other)),
                }
            }
        }

        let manager = Arc::new(RecordingManager::new());
        let tx_manager: Arc<dyn PlatformTransactionManager> = Arc::clone(&manager) as _;
        let mut factory = ProxyFactory::for_target(Arc::new(MarkingService));
        factory.add_advisor(transaction_advisor(tx_manager, transactional_source()));
        let proxy = factory.build().unwrap();

        proxy.call("deposit", vec![]).unwrap();
        // 成功路径上 rollback-only 标记强制回滚
        assert_eq!(manager.commits.load(Ordering::SeqCst), 0);
        assert_eq!(manager.rollbacks.load(Ordering::SeqCst), 1);
    }
}
