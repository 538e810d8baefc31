//! 容器内部通用工具：Bean 命名约定与依赖图分析

/// Bean 命名约定工具
pub mod naming {
    /// 将 PascalCase 类型名转换为 camelCase 的默认 Bean 名称
    ///
    /// `UserService` -> `userService`
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// 将字符串转换为 snake_case
    pub fn to_snake_case(s: &str) -> String {
        let mut result = String::with_capacity(s.len() + s.len() / 2);
        for ch in s.chars() {
            if ch.is_uppercase() {
                if !result.is_empty() {
                    result.push('_');
                }
                result.extend(ch.to_lowercase());
            } else {
                result.push(ch);
            }
        }
        result
    }
}

/// 依赖解析工具
pub mod dependency {
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap, HashSet};

    /// 跟踪正在创建中的 Bean，用于循环依赖检测
    #[derive(Debug, Default)]
    pub struct CreationTracker {
        creating: Mutex<Vec<String>>,
    }

    impl CreationTracker {
        pub fn new() -> Self {
            Self {
                creating: Mutex::new(Vec::new()),
            }
        }

        /// 指定 Bean 是否正在创建中
        pub fn is_creating(&self, name: &str) -> bool {
            self.creating.lock().iter().any(|n| n == name)
        }

        /// 标记 Bean 开始创建
        ///
        /// 若该 Bean 已在创建中（循环依赖）返回 `false`
        pub fn start_creating(&self, name: &str) -> bool {
            let mut creating = self.creating.lock();
            if creating.iter().any(|n| n == name) {
                return false;
            }
            creating.push(name.to_string());
            true
        }

        /// 标记 Bean 创建完成
        pub fn finish_creating(&self, name: &str) {
            let mut creating = self.creating.lock();
            if let Some(idx) = creating.iter().position(|n| n == name) {
                creating.remove(idx);
            }
        }

        /// 当前创建链快照（按进入顺序），用于错误信息
        pub fn current_chain(&self) -> Vec<String> {
            self.creating.lock().clone()
        }
    }

    /// 依赖图校验错误
    #[derive(Debug)]
    pub enum DependencyValidationError {
        /// 检测到循环依赖
        CircularDependency { cycle: Vec<String> },
        /// 声明的依赖未注册
        MissingDependency { bean: String, missing: String },
    }

    impl std::fmt::Display for DependencyValidationError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::CircularDependency { cycle } => {
                    write!(f, "circular dependency: {}", cycle.join(" -> "))
                }
                Self::MissingDependency { bean, missing } => {
                    write!(f, "bean '{bean}' depends on unregistered bean '{missing}'")
                }
            }
        }
    }

    /// 校验依赖图：缺失依赖与循环依赖
    pub fn validate_dependency_graph(
        dependencies: &HashMap<String, Vec<String>>,
    ) -> Result<(), DependencyValidationError> {
        for (bean, deps) in dependencies {
            for dep in deps {
                if !dependencies.contains_key(dep) {
                    return Err(DependencyValidationError::MissingDependency {
                        bean: bean.clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for bean in dependencies.keys() {
            if let Some(cycle) = walk_for_cycle(bean, dependencies, &mut visited, &mut stack) {
                return Err(DependencyValidationError::CircularDependency { cycle });
            }
        }
        Ok(())
    }

    fn walk_for_cycle(
        node: &str,
        graph: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        if stack.iter().any(|n| n == node) {
            let start = stack.iter().position(|n| n == node).unwrap();
            let mut cycle = stack[start..].to_vec();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if !visited.insert(node.to_string()) {
            return None;
        }
        stack.push(node.to_string());
        if let Some(deps) = graph.get(node) {
            for dep in deps {
                if let Some(cycle) = walk_for_cycle(dep, graph, visited, stack) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        None
    }

    /// 对依赖图做拓扑排序（依赖在前，被依赖者在后）
    ///
    /// 使用 BTreeMap 保证同层级节点的输出顺序确定
    pub fn topological_sort(
        dependencies: &HashMap<String, Vec<String>>,
    ) -> Result<Vec<String>, String> {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (bean, deps) in dependencies {
            in_degree.entry(bean.as_str()).or_insert(0);
            for dep in deps {
                in_degree.entry(dep.as_str()).or_insert(0);
                *in_degree.entry(bean.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(bean.as_str());
            }
        }

        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut sorted = Vec::with_capacity(in_degree.len());

        while let Some(node) = ready.pop() {
            sorted.push(node.to_string());
            if let Some(next) = dependents.get(node) {
                for &dependent in next {
                    let degree = in_degree.get_mut(dependent).expect("known node");
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(dependent);
                    }
                }
            }
        }

        if sorted.len() != in_degree.len() {
            return Err("circular dependency detected during topological sort".to_string());
        }
        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    mod naming_tests {
        use super::super::naming::*;

        #[test]
        fn test_to_camel_case() {
            assert_eq!(to_camel_case("UserService"), "userService");
            assert_eq!(to_camel_case("A"), "a");
            assert_eq!(to_camel_case(""), "");
            assert_eq!(to_camel_case("lowerCase"), "lowerCase");
        }

        #[test]
        fn test_to_snake_case() {
            assert_eq!(to_snake_case("UserService"), "user_service");
            assert_eq!(to_snake_case(""), "");
            assert_eq!(to_snake_case("lowercase"), "lowercase");
        }
    }

    mod dependency_tests {
        use super::super::dependency::*;
        use std::collections::HashMap;

        #[test]
        fn test_creation_tracker() {
            let tracker = CreationTracker::new();
            assert!(!tracker.is_creating("serviceA"));

            assert!(tracker.start_creating("serviceA"));
            assert!(tracker.is_creating("serviceA"));

            // 再次进入即为循环依赖
            assert!(!tracker.start_creating("serviceA"));

            tracker.finish_creating("serviceA");
            assert!(!tracker.is_creating("serviceA"));
        }

        #[test]
        fn test_creation_chain_preserves_order() {
            let tracker = CreationTracker::new();
            tracker.start_creating("serviceA");
            tracker.start_creating("serviceB");
            assert_eq!(tracker.current_chain(), vec!["serviceA", "serviceB"]);
        }

        #[test]
        fn test_validate_missing_dependency() {
            let mut deps = HashMap::new();
            deps.insert("serviceA".to_string(), vec!["serviceB".to_string()]);

            match validate_dependency_graph(&deps) {
                Err(DependencyValidationError::MissingDependency { bean, missing }) => {
                    assert_eq!(bean, "serviceA");
                    assert_eq!(missing, "serviceB");
                }
                other => panic!("expected MissingDependency, got {other:?}"),
            }
        }

        #[test]
        fn test_validate_circular_dependency() {
            let mut deps = HashMap::new();
            deps.insert("serviceA".to_string(), vec!["serviceB".to_string()]);
            deps.insert("serviceB".to_string(), vec!["serviceA".to_string()]);

            match validate_dependency_graph(&deps) {
                Err(DependencyValidationError::CircularDependency { cycle }) => {
                    assert!(cycle.len() >= 3);
                }
                other => panic!("expected CircularDependency, got {other:?}"),
            }
        }

        #[test]
        fn test_topological_sort_orders_dependencies_first() {
            let mut deps = HashMap::new();
            deps.insert("config".to_string(), vec![]);
            deps.insert("database".to_string(), vec!["config".to_string()]);
            deps.insert(
                "userService".to_string(),
                vec!["database".to_string(), "config".to_string()],
            );

            let sorted = topological_sort(&deps).unwrap();
            let pos = |name: &str| sorted.iter().position(|n| n == name).unwrap();
            assert!(pos("config") < pos("database"));
            assert!(pos("database") < pos("userService"));
        }
    }
}
