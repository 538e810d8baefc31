//! 切点（Pointcut）原语：类过滤器与方法匹配器
//!
//! 切点由 (ClassFilter, MethodMatcher) 组成，定义一条通知适用的范围。
//! 方法匹配器分两类：
//! - 静态匹配器：只依赖 (方法, 目标类)，结果可缓存
//! - 运行时匹配器（`is_runtime() == true`）：静态检查通过后，
//!   每次调用还要用实际参数再评估一次
//!
//! 约定：静态匹配器绝不允许被问及参数形式的匹配，
//! 违反即属编程错误，直接 panic

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use wyvern_core::{ArgValue, ClassDescriptor, MethodDescriptor};

/// 类过滤器
pub trait ClassFilter: Send + Sync {
    /// 目标类是否在此过滤器的范围内
    fn matches(&self, class: &ClassDescriptor) -> bool;
}

/// 方法匹配器
pub trait MethodMatcher: Send + Sync {
    /// 静态检查：不依赖调用参数
    fn matches(&self, method: &MethodDescriptor, class: &ClassDescriptor) -> bool;

    /// 是否为运行时匹配器（需要参数参与判定）
    fn is_runtime(&self) -> bool {
        false
    }

    /// 参数检查：仅对运行时匹配器有意义
    ///
    /// 静态匹配器的默认实现直接 panic：这是契约违反，
    /// 说明调用方没有遵守 is_runtime 协议
    fn matches_args(
        &self,
        method: &MethodDescriptor,
        _class: &ClassDescriptor,
        _args: &[ArgValue],
    ) -> bool {
        panic!(
            "matches_args called on a static MethodMatcher (is_runtime() == false) for '{}'",
            method.name()
        );
    }
}

/// 匹配一切的类过滤器
pub struct TrueClassFilter;

impl ClassFilter for TrueClassFilter {
    fn matches(&self, _class: &ClassDescriptor) -> bool {
        true
    }
}

/// 匹配一切的方法匹配器（静态）
pub struct TrueMethodMatcher;

impl MethodMatcher for TrueMethodMatcher {
    fn matches(&self, _method: &MethodDescriptor, _class: &ClassDescriptor) -> bool {
        true
    }
}

/// 全局共享的 TRUE 过滤器/匹配器实例
///
/// [`Pointcut::always`] 的两半引用这两个实例；
/// 切点相等性与"全匹配"判断都基于引用同一性
static TRUE_CLASS_FILTER: Lazy<Arc<dyn ClassFilter>> = Lazy::new(|| Arc::new(TrueClassFilter));
static TRUE_METHOD_MATCHER: Lazy<Arc<dyn MethodMatcher>> = Lazy::new(|| Arc::new(TrueMethodMatcher));

/// 获取共享的 TRUE 类过滤器
pub fn true_class_filter() -> Arc<dyn ClassFilter> {
    Arc::clone(&TRUE_CLASS_FILTER)
}

/// 获取共享的 TRUE 方法匹配器
pub fn true_method_matcher() -> Arc<dyn MethodMatcher> {
    Arc::clone(&TRUE_METHOD_MATCHER)
}

/// 切点：(类过滤器, 方法匹配器) 二元组
///
/// 相等性是两半的引用同一性，不做结构比较
#[derive(Clone)]
pub struct Pointcut {
    class_filter: Arc<dyn ClassFilter>,
    method_matcher: Arc<dyn MethodMatcher>,
}

impl Pointcut {
    pub fn new(class_filter: Arc<dyn ClassFilter>, method_matcher: Arc<dyn MethodMatcher>) -> Self {
        Self {
            class_filter,
            method_matcher,
        }
    }

    /// 无条件匹配一切的切点
    ///
    /// 评估时在触及过滤器/匹配器之前即短路
    pub fn always() -> Self {
        Self {
            class_filter: true_class_filter(),
            method_matcher: true_method_matcher(),
        }
    }

    /// 只限定类、不限定方法的切点
    pub fn for_class_filter(class_filter: Arc<dyn ClassFilter>) -> Self {
        Self {
            class_filter,
            method_matcher: true_method_matcher(),
        }
    }

    /// 只限定方法、不限定类的切点
    pub fn for_method_matcher(method_matcher: Arc<dyn MethodMatcher>) -> Self {
        Self {
            class_filter: true_class_filter(),
            method_matcher,
        }
    }

    /// 是否为全匹配切点（两半都是共享的 TRUE 实例）
    pub fn is_universal(&self) -> bool {
        Arc::ptr_eq(&self.class_filter, &TRUE_CLASS_FILTER)
            && Arc::ptr_eq(&self.method_matcher, &TRUE_METHOD_MATCHER)
    }

    pub fn class_filter(&self) -> &Arc<dyn ClassFilter> {
        &self.class_filter
    }

    pub fn method_matcher(&self) -> &Arc<dyn MethodMatcher> {
        &self.method_matcher
    }
}

impl PartialEq for Pointcut {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.class_filter, &other.class_filter)
            && Arc::ptr_eq(&self.method_matcher, &other.method_matcher)
    }
}

impl fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_universal() {
            write!(f, "Pointcut(ALWAYS)")
        } else {
            write!(f, "Pointcut(..)")
        }
    }
}

/// 切点评估工具
pub struct Pointcuts;

impl Pointcuts {
    /// 调用时评估：切点对 (方法, 类, 实参) 是否适用
    ///
    /// 评估顺序：
    /// 1. 全匹配切点立即返回 true（最廉价，必须先短路）
    /// 2. 类过滤器，不通过则不再咨询方法匹配器
    /// 3. 方法匹配器的静态检查
    /// 4. 运行时匹配器在静态检查通过后用实参复评，其结果为准；
    ///    静态匹配器以第 3 步结果为准
    pub fn matches(
        pointcut: &Pointcut,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
        args: &[ArgValue],
    ) -> bool {
        if pointcut.is_universal() {
            return true;
        }
        if !pointcut.class_filter().matches(class) {
            return false;
        }
        let matcher = pointcut.method_matcher();
        if !matcher.matches(method, class) {
            return false;
        }
        if matcher.is_runtime() {
            matcher.matches_args(method, class, args)
        } else {
            true
        }
    }

    /// 配置时评估：不依赖实参的保守检查
    ///
    /// 运行时匹配器只做静态部分（可能不精确，但绝不漏报）
    pub fn matches_statically(
        pointcut: &Pointcut,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
    ) -> bool {
        if pointcut.is_universal() {
            return true;
        }
        pointcut.class_filter().matches(class)
            && pointcut.method_matcher().matches(method, class)
    }
}

/// 简单的通配符模式匹配（支持 `*`）
///
/// 支持的模式：
/// - `*` - 匹配任意字符串
/// - `find*` - 以 find 开头
/// - `*Service` - 以 Service 结尾
/// - `*Repo*` - 包含 Repo
pub fn wildcard_match(pattern: &str, target: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains('*') {
        return pattern == target;
    }
    let regex_pattern = format!("^{}$", regex::escape(pattern).replace("\\*", ".*"));
    match Regex::new(&regex_pattern) {
        Ok(regex) => regex.is_match(target),
        Err(_) => false,
    }
}

/// 按类名通配符匹配的类过滤器
pub struct NamePatternClassFilter {
    pattern: String,
}

impl NamePatternClassFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl ClassFilter for NamePatternClassFilter {
    fn matches(&self, class: &ClassDescriptor) -> bool {
        wildcard_match(&self.pattern, class.name())
    }
}

/// 按方法名通配符匹配的方法匹配器（静态）
pub struct NamePatternMethodMatcher {
    patterns: Vec<String>,
}

impl NamePatternMethodMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            patterns: vec![pattern.into()],
        }
    }

    pub fn with_patterns(patterns: Vec<String>) -> Self {
        Self { patterns }
    }
}

impl MethodMatcher for NamePatternMethodMatcher {
    fn matches(&self, method: &MethodDescriptor, _class: &ClassDescriptor) -> bool {
        self.patterns
            .iter()
            .any(|p| wildcard_match(p, method.name()))
    }
}

/// 基于闭包的类过滤器
pub struct FnClassFilter {
    predicate: Arc<dyn Fn(&ClassDescriptor) -> bool + Send + Sync>,
}

impl FnClassFilter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&ClassDescriptor) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

impl ClassFilter for FnClassFilter {
    fn matches(&self, class: &ClassDescriptor) -> bool {
        (self.predicate)(class)
    }
}

/// 基于闭包的静态方法匹配器
pub struct FnMethodMatcher {
    predicate: Arc<dyn Fn(&MethodDescriptor, &ClassDescriptor) -> bool + Send + Sync>,
}

impl FnMethodMatcher {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&MethodDescriptor, &ClassDescriptor) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

impl MethodMatcher for FnMethodMatcher {
    fn matches(&self, method: &MethodDescriptor, class: &ClassDescriptor) -> bool {
        (self.predicate)(method, class)
    }
}

/// 基于闭包的运行时方法匹配器
///
/// 静态部分与参数部分各由一个闭包承担
pub struct FnArgsMethodMatcher {
    static_predicate: Arc<dyn Fn(&MethodDescriptor, &ClassDescriptor) -> bool + Send + Sync>,
    args_predicate:
        Arc<dyn Fn(&MethodDescriptor, &ClassDescriptor, &[ArgValue]) -> bool + Send + Sync>,
}

impl FnArgsMethodMatcher {
    pub fn new<S, A>(static_predicate: S, args_predicate: A) -> Self
    where
        S: Fn(&MethodDescriptor, &ClassDescriptor) -> bool + Send + Sync + 'static,
        A: Fn(&MethodDescriptor, &ClassDescriptor, &[ArgValue]) -> bool + Send + Sync + 'static,
    {
        Self {
            static_predicate: Arc::new(static_predicate),
            args_predicate: Arc::new(args_predicate),
        }
    }
}

impl MethodMatcher for FnArgsMethodMatcher {
    fn matches(&self, method: &MethodDescriptor, class: &ClassDescriptor) -> bool {
        (self.static_predicate)(method, class)
    }

    fn is_runtime(&self) -> bool {
        true
    }

    fn matches_args(
        &self,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
        args: &[ArgValue],
    ) -> bool {
        (self.args_predicate)(method, class, args)
    }
}
