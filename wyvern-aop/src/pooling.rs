//! 池化 TargetSource
//!
//! 有上限的对象池：`get_target` 借出（空闲优先，必要时新建），
//! `release_target` 归还。池满且全部借出时直接失败（快速失败的
//! 耗尽策略）。池状态通过引入 mixin（[`pool_stats_interface`]）
//! 暴露，可以直接对代理调用统计方法

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use wyvern_core::{ClassDescriptor, InterfaceDescriptor, Invocable, ReturnValue};

use crate::advice::{IntroductionInterceptor, MethodInterceptor};
use crate::advisor::Advisor;
use crate::error::{AopError, AopResult};
use crate::invocation::MethodInvocation;
use crate::pointcut::true_class_filter;
use crate::target_source::{TargetSource, TargetSupplier};

/// 池配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// 池容量上限（借出 + 空闲）
    pub max_size: usize,

    /// 创建时是否预填满空闲列表
    pub eager_fill: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            eager_fill: false,
        }
    }
}

impl PoolConfig {
    /// 从配置环境读取 `pool.max-size` / `pool.eager-fill`，
    /// 缺省项用默认值补齐
    pub fn from_environment(environment: &wyvern_core::Environment) -> Self {
        let mut config = Self::default();
        if let Some(max_size) = environment.get_i64("pool.max-size") {
            if max_size > 0 {
                config.max_size = max_size as usize;
            }
        }
        if let Some(eager_fill) = environment.get_bool("pool.eager-fill") {
            config.eager_fill = eager_fill;
        }
        config
    }
}

struct PoolState {
    idle: Vec<Arc<dyn Invocable>>,
    active: Vec<Arc<dyn Invocable>>,
}

struct PoolInner {
    class: Arc<ClassDescriptor>,
    supplier: TargetSupplier,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }
}

/// 池化 TargetSource
pub struct PoolingTargetSource {
    inner: Arc<PoolInner>,
}

impl PoolingTargetSource {
    pub fn new(
        class: Arc<ClassDescriptor>,
        supplier: TargetSupplier,
        config: PoolConfig,
    ) -> AopResult<Self> {
        let inner = Arc::new(PoolInner {
            class,
            supplier,
            config,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                active: Vec::new(),
            }),
        });

        if inner.config.eager_fill {
            let mut state = inner.state.lock();
            for _ in 0..inner.config.max_size {
                state.idle.push((inner.supplier)()?);
            }
            tracing::debug!(
                "Pool for '{}' eagerly filled with {} instance(s)",
                inner.class.name(),
                inner.config.max_size
            );
        }

        Ok(Self { inner })
    }

    /// 当前借出数量
    pub fn active_count(&self) -> usize {
        self.inner.active_count()
    }

    /// 当前空闲数量
    pub fn idle_count(&self) -> usize {
        self.inner.idle_count()
    }

    pub fn max_size(&self) -> usize {
        self.inner.config.max_size
    }
}

impl TargetSource for PoolingTargetSource {
    fn target_class(&self) -> Arc<ClassDescriptor> {
        Arc::clone(&self.inner.class)
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<dyn Invocable>> {
        let mut state = self.inner.state.lock();
        if let Some(instance) = state.idle.pop() {
            state.active.push(Arc::clone(&instance));
            return Ok(instance);
        }
        if state.active.len() >= self.inner.config.max_size {
            return Err(AopError::TargetUnavailable {
                source_name: self.name().to_string(),
                reason: format!(
                    "pool for '{}' exhausted ({} of {} borrowed)",
                    self.inner.class.name(),
                    state.active.len(),
                    self.inner.config.max_size
                ),
            });
        }
        let instance = (self.inner.supplier)().map_err(|e| AopError::TargetUnavailable {
            source_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        state.active.push(Arc::clone(&instance));
        Ok(instance)
    }

    fn release_target(&self, target: Arc<dyn Invocable>) -> AopResult<()> {
        let mut state = self.inner.state.lock();
        match state.active.iter().position(|t| Arc::ptr_eq(t, &target)) {
            Some(idx) => {
                let instance = state.active.remove(idx);
                state.idle.push(instance);
                Ok(())
            }
            None => {
                tracing::error!(
                    "Release of an object never borrowed from pool for '{}'",
                    self.inner.class.name()
                );
                Err(AopError::ReleaseMismatch(self.name().to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "PoolingTargetSource"
    }

    fn introduction_advisors(&self) -> Vec<Advisor> {
        vec![Advisor::introduction(
            true_class_filter(),
            Arc::new(PoolStatsIntroduction {
                inner: Arc::clone(&self.inner),
            }),
        )]
    }

    fn dispose(&self) {
        let mut state = self.inner.state.lock();
        if !state.active.is_empty() {
            tracing::warn!(
                "Disposing pool for '{}' with {} instance(s) still borrowed",
                self.inner.class.name(),
                state.active.len()
            );
        }
        state.idle.clear();
        state.active.clear();
    }
}

/// 池统计 mixin 接口
pub fn pool_stats_interface() -> Arc<InterfaceDescriptor> {
    static INTERFACE: Lazy<Arc<InterfaceDescriptor>> = Lazy::new(|| {
        Arc::new(
            InterfaceDescriptor::new("PoolStats")
                .with_method("pool_active_count")
                .with_method("pool_idle_count")
                .with_method("pool_max_size"),
        )
    });
    Arc::clone(&INTERFACE)
}

/// 池统计引入拦截器
///
/// 应答 [`pool_stats_interface`] 的方法，其余调用继续走链
struct PoolStatsIntroduction {
    inner: Arc<PoolInner>,
}

impl MethodInterceptor for PoolStatsIntroduction {
    fn invoke(&self, invocation: &mut MethodInvocation) -> AopResult<ReturnValue> {
        match invocation.method_name() {
            "pool_active_count" => Ok(Arc::new(self.inner.active_count())),
            "pool_idle_count" => Ok(Arc::new(self.inner.idle_count())),
            "pool_max_size" => Ok(Arc::new(self.inner.config.max_size)),
            _ => invocation.proceed(),
        }
    }

    fn name(&self) -> &str {
        "PoolStatsIntroduction"
    }
}

impl IntroductionInterceptor for PoolStatsIntroduction {
    fn introduced_interfaces(&self) -> Vec<Arc<InterfaceDescriptor>> {
        vec![pool_stats_interface()]
    }
}
