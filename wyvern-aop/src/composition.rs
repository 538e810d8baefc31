//! 切点组合：类过滤器与方法匹配器的并/交运算
//!
//! 两半独立组合；方法匹配器的组合结果只要有一个操作数是
//! 运行时匹配器，整体就是运行时匹配器（保守：一旦需要参数
//! 参与判定就不能再当作静态结果缓存）

use std::sync::Arc;

use wyvern_core::{ArgValue, ClassDescriptor, MethodDescriptor};

use crate::pointcut::{ClassFilter, MethodMatcher, Pointcut};

struct UnionClassFilter(Arc<dyn ClassFilter>, Arc<dyn ClassFilter>);

impl ClassFilter for UnionClassFilter {
    fn matches(&self, class: &ClassDescriptor) -> bool {
        self.0.matches(class) || self.1.matches(class)
    }
}

struct IntersectionClassFilter(Arc<dyn ClassFilter>, Arc<dyn ClassFilter>);

impl ClassFilter for IntersectionClassFilter {
    fn matches(&self, class: &ClassDescriptor) -> bool {
        self.0.matches(class) && self.1.matches(class)
    }
}

/// 类过滤器组合工具
pub struct ClassFilters;

impl ClassFilters {
    /// 并：任一操作数匹配即匹配
    pub fn union(a: Arc<dyn ClassFilter>, b: Arc<dyn ClassFilter>) -> Arc<dyn ClassFilter> {
        Arc::new(UnionClassFilter(a, b))
    }

    /// 交：两个操作数都匹配才匹配
    pub fn intersection(a: Arc<dyn ClassFilter>, b: Arc<dyn ClassFilter>) -> Arc<dyn ClassFilter> {
        Arc::new(IntersectionClassFilter(a, b))
    }
}

/// 对单个操作数做完整评估（静态 + 必要时的参数评估）
///
/// 静态操作数绝不会收到 3 参形式的调用
fn full_match(
    matcher: &Arc<dyn MethodMatcher>,
    method: &MethodDescriptor,
    class: &ClassDescriptor,
    args: &[ArgValue],
) -> bool {
    if !matcher.matches(method, class) {
        return false;
    }
    if matcher.is_runtime() {
        matcher.matches_args(method, class, args)
    } else {
        true
    }
}

struct UnionMethodMatcher(Arc<dyn MethodMatcher>, Arc<dyn MethodMatcher>);

impl MethodMatcher for UnionMethodMatcher {
    fn matches(&self, method: &MethodDescriptor, class: &ClassDescriptor) -> bool {
        self.0.matches(method, class) || self.1.matches(method, class)
    }

    fn is_runtime(&self) -> bool {
        self.0.is_runtime() || self.1.is_runtime()
    }

    fn matches_args(
        &self,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
        args: &[ArgValue],
    ) -> bool {
        full_match(&self.0, method, class, args) || full_match(&self.1, method, class, args)
    }
}

struct IntersectionMethodMatcher(Arc<dyn MethodMatcher>, Arc<dyn MethodMatcher>);

impl MethodMatcher for IntersectionMethodMatcher {
    fn matches(&self, method: &MethodDescriptor, class: &ClassDescriptor) -> bool {
        self.0.matches(method, class) && self.1.matches(method, class)
    }

    fn is_runtime(&self) -> bool {
        self.0.is_runtime() || self.1.is_runtime()
    }

    fn matches_args(
        &self,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
        args: &[ArgValue],
    ) -> bool {
        full_match(&self.0, method, class, args) && full_match(&self.1, method, class, args)
    }
}

/// 方法匹配器组合工具
pub struct MethodMatchers;

impl MethodMatchers {
    /// 并：任一操作数完整匹配即匹配
    pub fn union(a: Arc<dyn MethodMatcher>, b: Arc<dyn MethodMatcher>) -> Arc<dyn MethodMatcher> {
        Arc::new(UnionMethodMatcher(a, b))
    }

    /// 交：两个操作数都完整匹配才匹配
    pub fn intersection(
        a: Arc<dyn MethodMatcher>,
        b: Arc<dyn MethodMatcher>,
    ) -> Arc<dyn MethodMatcher> {
        Arc::new(IntersectionMethodMatcher(a, b))
    }
}

/// 可组合切点
///
/// 从一个初始状态出发，对两半分别叠加并/交运算，
/// 最后取回一个普通 [`Pointcut`]
pub struct ComposablePointcut {
    class_filter: Arc<dyn ClassFilter>,
    method_matcher: Arc<dyn MethodMatcher>,
}

impl ComposablePointcut {
    /// 从全匹配状态开始
    pub fn new() -> Self {
        let p = Pointcut::always();
        Self {
            class_filter: Arc::clone(p.class_filter()),
            method_matcher: Arc::clone(p.method_matcher()),
        }
    }

    /// 从已有切点开始
    pub fn from_pointcut(pointcut: &Pointcut) -> Self {
        Self {
            class_filter: Arc::clone(pointcut.class_filter()),
            method_matcher: Arc::clone(pointcut.method_matcher()),
        }
    }

    /// 类过滤器取并
    pub fn union_class_filter(mut self, filter: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = ClassFilters::union(self.class_filter, filter);
        self
    }

    /// 类过滤器取交
    pub fn intersection_class_filter(mut self, filter: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = ClassFilters::intersection(self.class_filter, filter);
        self
    }

    /// 方法匹配器取并
    pub fn union_method_matcher(mut self, matcher: Arc<dyn MethodMatcher>) -> Self {
        self.method_matcher = MethodMatchers::union(self.method_matcher, matcher);
        self
    }

    /// 方法匹配器取交
    pub fn intersection_method_matcher(mut self, matcher: Arc<dyn MethodMatcher>) -> Self {
        self.method_matcher = MethodMatchers::intersection(self.method_matcher, matcher);
        self
    }

    /// 与另一个完整切点取并（两半分别取并）
    pub fn union_pointcut(self, pointcut: &Pointcut) -> Self {
        self.union_class_filter(Arc::clone(pointcut.class_filter()))
            .union_method_matcher(Arc::clone(pointcut.method_matcher()))
    }

    /// 与另一个完整切点取交（两半分别取交）
    pub fn intersection_pointcut(self, pointcut: &Pointcut) -> Self {
        self.intersection_class_filter(Arc::clone(pointcut.class_filter()))
            .intersection_method_matcher(Arc::clone(pointcut.method_matcher()))
    }

    /// 取回组合结果
    pub fn into_pointcut(self) -> Pointcut {
        Pointcut::new(self.class_filter, self.method_matcher)
    }
}

impl Default for ComposablePointcut {
    fn default() -> Self {
        Self::new()
    }
}
