//! Advisor：适用条件与拦截行为的配对
//!
//! 两种形态：
//! - 环绕 Advisor：切点 + 环绕拦截器，按方法粒度适用
//! - 引入 Advisor：类过滤器 + 引入拦截器，按类粒度适用（mixin）

use std::fmt;
use std::sync::Arc;

use wyvern_core::{ClassDescriptor, InterfaceDescriptor};

use crate::advice::{IntroductionInterceptor, MethodInterceptor};
use crate::pointcut::{ClassFilter, Pointcut, Pointcuts};

/// Advisor
#[derive(Clone)]
pub enum Advisor {
    /// 环绕拦截：切点命中的方法调用经过该拦截器
    Interception {
        pointcut: Pointcut,
        interceptor: Arc<dyn MethodInterceptor>,
    },

    /// 接口引入：类过滤器命中的代理获得额外接口，
    /// 对引入接口方法的调用由拦截器应答
    Introduction {
        class_filter: Arc<dyn ClassFilter>,
        interceptor: Arc<dyn IntroductionInterceptor>,
    },
}

impl Advisor {
    /// 环绕 Advisor
    pub fn interception(pointcut: Pointcut, interceptor: Arc<dyn MethodInterceptor>) -> Self {
        Advisor::Interception {
            pointcut,
            interceptor,
        }
    }

    /// 无条件适用的环绕 Advisor
    pub fn on_all(interceptor: Arc<dyn MethodInterceptor>) -> Self {
        Advisor::Interception {
            pointcut: Pointcut::always(),
            interceptor,
        }
    }

    /// 引入 Advisor
    pub fn introduction(
        class_filter: Arc<dyn ClassFilter>,
        interceptor: Arc<dyn IntroductionInterceptor>,
    ) -> Self {
        Advisor::Introduction {
            class_filter,
            interceptor,
        }
    }

    pub fn is_introduction(&self) -> bool {
        matches!(self, Advisor::Introduction { .. })
    }

    /// 统一取出环绕拦截器视图
    pub fn interceptor(&self) -> Arc<dyn MethodInterceptor> {
        match self {
            Advisor::Interception { interceptor, .. } => Arc::clone(interceptor),
            Advisor::Introduction { interceptor, .. } => {
                Arc::clone(interceptor) as Arc<dyn MethodInterceptor>
            }
        }
    }

    /// 引入 Advisor 贡献的接口（环绕 Advisor 为空）
    pub fn introduced_interfaces(&self) -> Vec<Arc<InterfaceDescriptor>> {
        match self {
            Advisor::Interception { .. } => Vec::new(),
            Advisor::Introduction { interceptor, .. } => interceptor.introduced_interfaces(),
        }
    }
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisor::Interception { pointcut, interceptor } => f
                .debug_struct("Advisor::Interception")
                .field("pointcut", pointcut)
                .field("interceptor", &interceptor.name())
                .finish(),
            Advisor::Introduction { interceptor, .. } => f
                .debug_struct("Advisor::Introduction")
                .field("interceptor", &interceptor.name())
                .finish(),
        }
    }
}

/// 配置期静态适用性检查：该切点是否可能对目标类生效
///
/// 保守分析，只用于避免给永远不会命中的类挂上拦截器：
/// - 类过滤器先拒绝则整体拒绝
/// - 枚举目标类所有可达公开方法（含继承），任一方法静态命中即适用
/// - 提供接口限定时，跳过不在限定接口上声明的方法
///   （只按接口 X 构建的代理不应获得 X 之外方法的通知）
/// - 运行时匹配器只做静态部分：可能不精确，但绝不漏报
pub fn can_apply_pointcut(
    pointcut: &Pointcut,
    class: &ClassDescriptor,
    interfaces: Option<&[Arc<InterfaceDescriptor>]>,
) -> bool {
    if !pointcut.class_filter().matches(class) {
        return false;
    }
    if pointcut.is_universal() {
        return true;
    }
    for method in class.reachable_methods() {
        if let Some(restriction) = interfaces {
            if !restriction.iter().any(|i| i.declares(method.name())) {
                continue;
            }
        }
        if Pointcuts::matches_statically(pointcut, method, class) {
            return true;
        }
    }
    false
}

/// Advisor 级别的适用性检查
///
/// 引入 Advisor 按类粒度判定（只看类过滤器），
/// 环绕 Advisor 委托给切点检查
pub fn can_apply(
    advisor: &Advisor,
    class: &ClassDescriptor,
    interfaces: Option<&[Arc<InterfaceDescriptor>]>,
) -> bool {
    match advisor {
        Advisor::Introduction { class_filter, .. } => class_filter.matches(class),
        Advisor::Interception { pointcut, .. } => can_apply_pointcut(pointcut, class, interfaces),
    }
}
