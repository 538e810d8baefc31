//! 方法调用分发
//!
//! [`MethodInvocation`] 携带方法身份、实参与一条已匹配的拦截器链，
//! 用游标逐个推进；链走完后对目标对象做真实调用。
//! 运行时匹配器在 proceed 中用实参复评，不命中的条目整体跳过。
//!
//! 另提供"当前代理"线程绑定上下文（[`AopContext`]），
//! 由 RAII 守卫保证所有退出路径都恢复先前值

use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;

use wyvern_core::{ArgValue, ClassDescriptor, Invocable, MethodDescriptor, ReturnValue};

use crate::advice::MethodInterceptor;
use crate::error::AopResult;
use crate::pointcut::MethodMatcher;

/// 链条目
///
/// 静态命中的拦截器直接进链；运行时匹配器静态部分命中的
/// 拦截器带着匹配器进链，实参判定推迟到调用时
#[derive(Clone)]
pub(crate) enum ChainEntry {
    Static(Arc<dyn MethodInterceptor>),
    Dynamic {
        interceptor: Arc<dyn MethodInterceptor>,
        matcher: Arc<dyn MethodMatcher>,
    },
}

/// 一次代理方法调用
pub struct MethodInvocation {
    method: MethodDescriptor,
    args: Vec<ArgValue>,
    target: Arc<dyn Invocable>,
    target_class: Arc<ClassDescriptor>,
    chain: Arc<Vec<ChainEntry>>,
    cursor: usize,
}

impl MethodInvocation {
    pub(crate) fn new(
        method: MethodDescriptor,
        args: Vec<ArgValue>,
        target: Arc<dyn Invocable>,
        target_class: Arc<ClassDescriptor>,
        chain: Arc<Vec<ChainEntry>>,
    ) -> Self {
        Self {
            method,
            args,
            target,
            target_class,
            chain,
            cursor: 0,
        }
    }

    /// 被调用的方法
    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    /// 实参
    pub fn args(&self) -> &[ArgValue] {
        &self.args
    }

    /// 按具体类型访问第 index 个实参
    pub fn arg<T: Any + Send + Sync>(&self, index: usize) -> Option<&T> {
        self.args.get(index)?.downcast_ref::<T>()
    }

    /// 目标类描述符
    pub fn target_class(&self) -> &Arc<ClassDescriptor> {
        &self.target_class
    }

    /// 当前目标对象
    pub fn target(&self) -> &Arc<dyn Invocable> {
        &self.target
    }

    /// 方法签名（日志用）
    pub fn signature(&self) -> String {
        format!("{}::{}", self.target_class.name(), self.method.name())
    }

    /// 继续执行链上的下一个拦截器；链走完后调用目标方法
    ///
    /// 运行时匹配器在这里用实参复评：不命中的条目被整体跳过
    /// （而不是空转通过）
    pub fn proceed(&mut self) -> AopResult<ReturnValue> {
        loop {
            if self.cursor == self.chain.len() {
                return self.invoke_target();
            }
            let entry = self.chain[self.cursor].clone();
            self.cursor += 1;
            match entry {
                ChainEntry::Static(interceptor) => {
                    tracing::trace!(
                        "Entering interceptor '{}' for {}",
                        interceptor.name(),
                        self.signature()
                    );
                    return interceptor.invoke(self);
                }
                ChainEntry::Dynamic {
                    interceptor,
                    matcher,
                } => {
                    if matcher.matches_args(&self.method, &self.target_class, &self.args) {
                        tracing::trace!(
                            "Entering dynamic interceptor '{}' for {}",
                            interceptor.name(),
                            self.signature()
                        );
                        return interceptor.invoke(self);
                    }
                    // 实参不命中：跳过该条目，继续链上的下一个
                }
            }
        }
    }

    /// 终点：对目标对象做真实调用
    ///
    /// 应用异常原样向上传播，分发层不吞并、不改写
    fn invoke_target(&self) -> AopResult<ReturnValue> {
        self.target
            .invoke(self.method.name(), &self.args)
            .map_err(Into::into)
    }
}

thread_local! {
    /// 当前线程暴露的代理栈（嵌套调用各占一层）
    static CURRENT_PROXY: RefCell<Vec<Arc<dyn Invocable>>> = const { RefCell::new(Vec::new()) };
}

/// 当前代理上下文
///
/// `expose_proxy` 打开时，被通知的调用期间可以从这里取到
/// "当前代理"，使自调用也能回到代理（从而经过通知）
pub struct AopContext;

impl AopContext {
    /// 当前线程最内层被暴露的代理
    pub fn current_proxy() -> Option<Arc<dyn Invocable>> {
        CURRENT_PROXY.with(|stack| stack.borrow().last().map(Arc::clone))
    }
}

/// 暴露代理的 RAII 守卫
///
/// 构造时压栈，Drop 时弹栈（包括 panic 与错误返回路径），
/// 保证外层调用看到的"当前代理"不被内层破坏
pub(crate) struct ExposedProxyGuard;

impl ExposedProxyGuard {
    pub(crate) fn expose(proxy: Arc<dyn Invocable>) -> Self {
        CURRENT_PROXY.with(|stack| stack.borrow_mut().push(proxy));
        Self
    }
}

impl Drop for ExposedProxyGuard {
    fn drop(&mut self) {
        CURRENT_PROXY.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyvern_core::{InvokeError, InvokeResult};

    struct Echo;
    impl Invocable for Echo {
        fn class(&self) -> Arc<ClassDescriptor> {
            Arc::new(ClassDescriptor::new("Echo").with_method("echo"))
        }
        fn invoke(&self, method: &str, args: &[ArgValue]) -> InvokeResult {
            match method {
                "echo" => Ok(args.first().cloned().unwrap_or_else(|| Arc::new(()))),
                other => Err(InvokeError::no_such_method(&self.class(), other)),
            }
        }
    }

    #[test]
    fn test_empty_chain_invokes_target() {
        let target: Arc<dyn Invocable> = Arc::new(Echo);
        let class = target.class();
        let mut invocation = MethodInvocation::new(
            MethodDescriptor::new("echo"),
            vec![Arc::new(7_u32) as ArgValue],
            target,
            class,
            Arc::new(Vec::new()),
        );
        let result = invocation.proceed().unwrap();
        assert_eq!(result.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn test_exposed_proxy_guard_restores_on_drop() {
        let proxy: Arc<dyn Invocable> = Arc::new(Echo);
        assert!(AopContext::current_proxy().is_none());
        {
            let _guard = ExposedProxyGuard::expose(Arc::clone(&proxy));
            let current = AopContext::current_proxy().unwrap();
            assert!(Arc::ptr_eq(&current, &proxy));
        }
        assert!(AopContext::current_proxy().is_none());
    }

    #[test]
    fn test_exposed_proxy_guard_restores_across_panic() {
        let proxy: Arc<dyn Invocable> = Arc::new(Echo);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ExposedProxyGuard::expose(Arc::clone(&proxy));
            panic!("inner failure");
        }));
        assert!(result.is_err());
        // 守卫在 panic 展开时也要弹栈
        assert!(AopContext::current_proxy().is_none());
    }
}
