//! 通知（Advice）定义与归一化
//!
//! 环绕拦截器是分发链唯一认识的形态；前置/返回后/异常通知
//! 通过适配器包装成环绕拦截器。任意形态的通知对象在进入
//! 代理装配前都要经过 [`AdviceAdapterRegistry`] 归一化为 Advisor

use std::any::Any;
use std::sync::Arc;

use wyvern_core::{
    ArgValue, ClassDescriptor, InterfaceDescriptor, MethodDescriptor, ReturnValue, ThrownException,
};

use crate::advisor::Advisor;
use crate::error::{AopError, AopResult};
use crate::invocation::MethodInvocation;

/// 环绕拦截器
///
/// 拦截器持有整条剩余链：通过 `invocation.proceed()` 继续执行，
/// 也可以不调用 proceed 而自行给出结果
pub trait MethodInterceptor: Send + Sync {
    /// 拦截方法调用
    fn invoke(&self, invocation: &mut MethodInvocation) -> AopResult<ReturnValue>;

    /// 拦截器名称（用于日志和调试）
    fn name(&self) -> &str {
        "MethodInterceptor"
    }
}

/// 前置通知：在目标方法执行前调用，不能改变调用结果
pub trait BeforeAdvice: Send + Sync {
    fn before(&self, method: &MethodDescriptor, args: &[ArgValue], class: &ClassDescriptor);

    fn name(&self) -> &str {
        "BeforeAdvice"
    }
}

/// 返回后通知：目标方法正常返回后调用
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(
        &self,
        result: &ReturnValue,
        method: &MethodDescriptor,
        args: &[ArgValue],
        class: &ClassDescriptor,
    );

    fn name(&self) -> &str {
        "AfterReturningAdvice"
    }
}

/// 异常通知：目标方法抛出应用异常时调用（观察，不拦截）
pub trait ThrowsAdvice: Send + Sync {
    fn after_throwing(
        &self,
        thrown: &ThrownException,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
    );

    fn name(&self) -> &str {
        "ThrowsAdvice"
    }
}

/// 前置通知 → 环绕拦截器适配
pub struct BeforeAdviceInterceptor {
    advice: Arc<dyn BeforeAdvice>,
}

impl BeforeAdviceInterceptor {
    pub fn new(advice: Arc<dyn BeforeAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for BeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation) -> AopResult<ReturnValue> {
        self.advice.before(
            invocation.method(),
            invocation.args(),
            invocation.target_class(),
        );
        invocation.proceed()
    }

    fn name(&self) -> &str {
        self.advice.name()
    }
}

/// 返回后通知 → 环绕拦截器适配
pub struct AfterReturningAdviceInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AfterReturningAdviceInterceptor {
    pub fn new(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation) -> AopResult<ReturnValue> {
        let result = invocation.proceed()?;
        self.advice.after_returning(
            &result,
            invocation.method(),
            invocation.args(),
            invocation.target_class(),
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        self.advice.name()
    }
}

/// 异常通知 → 环绕拦截器适配
///
/// 只观察应用异常，异常本身原样向上传播
pub struct ThrowsAdviceInterceptor {
    advice: Arc<dyn ThrowsAdvice>,
}

impl ThrowsAdviceInterceptor {
    pub fn new(advice: Arc<dyn ThrowsAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation) -> AopResult<ReturnValue> {
        let result = invocation.proceed();
        if let Err(error) = &result {
            if let Some(thrown) = error.thrown_exception() {
                self.advice
                    .after_throwing(thrown, invocation.method(), invocation.target_class());
            }
        }
        result
    }

    fn name(&self) -> &str {
        self.advice.name()
    }
}

/// 引入拦截器（mixin）
///
/// 除了拦截目标类的调用之外，还为代理贡献额外的接口；
/// 对引入接口方法的调用完全由拦截器自己应答，绝不触达目标对象
pub trait IntroductionInterceptor: MethodInterceptor {
    /// 本引入贡献的接口
    fn introduced_interfaces(&self) -> Vec<Arc<InterfaceDescriptor>>;

    /// 指定方法是否由引入接口声明
    fn implements_method(&self, method_name: &str) -> bool {
        self.introduced_interfaces()
            .iter()
            .any(|interface| interface.declares(method_name))
    }
}

/// 通知适配器：尝试把一个未类型化的通知 Bean 归一化为 Advisor
pub trait AdviceAdapter: Send + Sync {
    fn adapt(&self, advice: &Arc<dyn Any + Send + Sync>) -> Option<Advisor>;
}

/// 内建适配：已是 Advisor 的对象
struct AdvisorAdapter;

impl AdviceAdapter for AdvisorAdapter {
    fn adapt(&self, advice: &Arc<dyn Any + Send + Sync>) -> Option<Advisor> {
        advice.downcast_ref::<Advisor>().cloned()
    }
}

/// 内建适配：裸环绕拦截器 → 全匹配 Advisor
struct InterceptorAdapter;

impl AdviceAdapter for InterceptorAdapter {
    fn adapt(&self, advice: &Arc<dyn Any + Send + Sync>) -> Option<Advisor> {
        advice
            .downcast_ref::<Arc<dyn MethodInterceptor>>()
            .map(|interceptor| Advisor::on_all(Arc::clone(interceptor)))
    }
}

/// 内建适配：前置通知
struct BeforeAdviceAdapter;

impl AdviceAdapter for BeforeAdviceAdapter {
    fn adapt(&self, advice: &Arc<dyn Any + Send + Sync>) -> Option<Advisor> {
        advice.downcast_ref::<Arc<dyn BeforeAdvice>>().map(|a| {
            Advisor::on_all(Arc::new(BeforeAdviceInterceptor::new(Arc::clone(a))))
        })
    }
}

/// 内建适配：返回后通知
struct AfterReturningAdviceAdapter;

impl AdviceAdapter for AfterReturningAdviceAdapter {
    fn adapt(&self, advice: &Arc<dyn Any + Send + Sync>) -> Option<Advisor> {
        advice.downcast_ref::<Arc<dyn AfterReturningAdvice>>().map(|a| {
            Advisor::on_all(Arc::new(AfterReturningAdviceInterceptor::new(Arc::clone(a))))
        })
    }
}

/// 内建适配：异常通知
struct ThrowsAdviceAdapter;

impl AdviceAdapter for ThrowsAdviceAdapter {
    fn adapt(&self, advice: &Arc<dyn Any + Send + Sync>) -> Option<Advisor> {
        advice.downcast_ref::<Arc<dyn ThrowsAdvice>>().map(|a| {
            Advisor::on_all(Arc::new(ThrowsAdviceInterceptor::new(Arc::clone(a))))
        })
    }
}

/// 通知适配器注册表
///
/// 依次尝试每个适配器，全部失败则报配置错误：
/// 无法识别的通知形态在装配期失败，不会拖到首次调用
pub struct AdviceAdapterRegistry {
    adapters: Vec<Box<dyn AdviceAdapter>>,
}

impl AdviceAdapterRegistry {
    /// 带全部内建适配器的注册表
    pub fn standard() -> Self {
        Self {
            adapters: vec![
                Box::new(AdvisorAdapter),
                Box::new(InterceptorAdapter),
                Box::new(BeforeAdviceAdapter),
                Box::new(AfterReturningAdviceAdapter),
                Box::new(ThrowsAdviceAdapter),
            ],
        }
    }

    /// 注册自定义适配器（排在内建适配器之后）
    pub fn register(&mut self, adapter: Box<dyn AdviceAdapter>) {
        self.adapters.push(adapter);
    }

    /// 归一化：任意通知对象 → 规范 Advisor
    pub fn wrap(&self, advice: Arc<dyn Any + Send + Sync>) -> AopResult<Advisor> {
        for adapter in &self.adapters {
            if let Some(advisor) = adapter.adapt(&advice) {
                return Ok(advisor);
            }
        }
        Err(AopError::UnknownAdviceShape(format!(
            "type id {:?}",
            advice.as_ref().type_id()
        )))
    }
}

impl Default for AdviceAdapterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
