//! 线程本地 TargetSource
//!
//! 每个调用线程在首次访问时惰性创建自己的目标实例并在之后复用，
//! 线程之间互不可见。实例按 ThreadId 登记在一张共享表里，
//! 容器关闭时可以统一清空，避免线程池复用导致的陈旧状态泄漏。
//! 命中/未命中统计通过引入 mixin 暴露

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use wyvern_core::{ClassDescriptor, InterfaceDescriptor, Invocable, ReturnValue};

use crate::advice::{IntroductionInterceptor, MethodInterceptor};
use crate::advisor::Advisor;
use crate::error::{AopError, AopResult};
use crate::invocation::MethodInvocation;
use crate::pointcut::true_class_filter;
use crate::target_source::{TargetSource, TargetSupplier};

struct ThreadLocalInner {
    class: Arc<ClassDescriptor>,
    supplier: TargetSupplier,
    instances: Mutex<HashMap<ThreadId, Arc<dyn Invocable>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

/// 线程本地 TargetSource
pub struct ThreadLocalTargetSource {
    inner: Arc<ThreadLocalInner>,
}

impl ThreadLocalTargetSource {
    pub fn new(class: Arc<ClassDescriptor>, supplier: TargetSupplier) -> Self {
        Self {
            inner: Arc::new(ThreadLocalInner {
                class,
                supplier,
                instances: Mutex::new(HashMap::new()),
                hits: AtomicUsize::new(0),
                misses: AtomicUsize::new(0),
            }),
        }
    }

    /// 复用已有线程绑定实例的次数
    pub fn hit_count(&self) -> usize {
        self.inner.hits.load(Ordering::Relaxed)
    }

    /// 为新线程创建实例的次数
    pub fn miss_count(&self) -> usize {
        self.inner.misses.load(Ordering::Relaxed)
    }

    /// 当前绑定了实例的线程数
    pub fn bound_thread_count(&self) -> usize {
        self.inner.instances.lock().len()
    }
}

impl TargetSource for ThreadLocalTargetSource {
    fn target_class(&self) -> Arc<ClassDescriptor> {
        Arc::clone(&self.inner.class)
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<dyn Invocable>> {
        let thread_id = std::thread::current().id();
        let mut instances = self.inner.instances.lock();
        if let Some(instance) = instances.get(&thread_id) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(instance));
        }

        let instance = (self.inner.supplier)().map_err(|e| AopError::TargetUnavailable {
            source_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        instances.insert(thread_id, Arc::clone(&instance));
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "Bound new '{}' instance to thread {:?}",
            self.inner.class.name(),
            thread_id
        );
        Ok(instance)
    }

    fn release_target(&self, target: Arc<dyn Invocable>) -> AopResult<()> {
        // 实例保持线程绑定，归还只校验配对纪律
        let thread_id = std::thread::current().id();
        let instances = self.inner.instances.lock();
        match instances.get(&thread_id) {
            Some(bound) if Arc::ptr_eq(bound, &target) => Ok(()),
            _ => {
                tracing::error!(
                    "Release of an object not bound to the current thread for '{}'",
                    self.inner.class.name()
                );
                Err(AopError::ReleaseMismatch(self.name().to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "ThreadLocalTargetSource"
    }

    fn introduction_advisors(&self) -> Vec<Advisor> {
        vec![Advisor::introduction(
            true_class_filter(),
            Arc::new(ThreadLocalStatsIntroduction {
                inner: Arc::clone(&self.inner),
            }),
        )]
    }

    fn dispose(&self) {
        let mut instances = self.inner.instances.lock();
        let count = instances.len();
        instances.clear();
        if count > 0 {
            tracing::debug!(
                "Cleared {} thread-bound instance(s) of '{}'",
                count,
                self.inner.class.name()
            );
        }
    }
}

/// 线程本地统计 mixin 接口
pub fn thread_local_stats_interface() -> Arc<InterfaceDescriptor> {
    static INTERFACE: Lazy<Arc<InterfaceDescriptor>> = Lazy::new(|| {
        Arc::new(
            InterfaceDescriptor::new("ThreadLocalStats")
                .with_method("thread_local_hit_count")
                .with_method("thread_local_miss_count")
                .with_method("thread_local_bound_count"),
        )
    });
    Arc::clone(&INTERFACE)
}

struct ThreadLocalStatsIntroduction {
    inner: Arc<ThreadLocalInner>,
}

impl MethodInterceptor for ThreadLocalStatsIntroduction {
    fn invoke(&self, invocation: &mut MethodInvocation) -> AopResult<ReturnValue> {
        match invocation.method_name() {
            "thread_local_hit_count" => Ok(Arc::new(self.inner.hits.load(Ordering::Relaxed))),
            "thread_local_miss_count" => Ok(Arc::new(self.inner.misses.load(Ordering::Relaxed))),
            "thread_local_bound_count" => Ok(Arc::new(self.inner.instances.lock().len())),
            _ => invocation.proceed(),
        }
    }

    fn name(&self) -> &str {
        "ThreadLocalStatsIntroduction"
    }
}

impl IntroductionInterceptor for ThreadLocalStatsIntroduction {
    fn introduced_interfaces(&self) -> Vec<Arc<InterfaceDescriptor>> {
        vec![thread_local_stats_interface()]
    }
}
