//! 配置环境（Environment）与配置源（PropertySource）
//!
//! 多个配置源按注册顺序组成查找链，先注册者优先

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};

/// 配置值类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<toml::Value> for ConfigValue {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => ConfigValue::String(s),
            toml::Value::Integer(i) => ConfigValue::Int(i),
            toml::Value::Float(f) => ConfigValue::Float(f),
            toml::Value::Boolean(b) => ConfigValue::Bool(b),
            toml::Value::Datetime(d) => ConfigValue::String(d.to_string()),
            toml::Value::Array(items) => {
                ConfigValue::Array(items.into_iter().map(Into::into).collect())
            }
            toml::Value::Table(table) => ConfigValue::Object(
                table.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

/// 配置源 trait
pub trait PropertySource: Send + Sync {
    /// 配置源名称（用于日志）
    fn name(&self) -> &str;

    /// 查找配置项
    fn get_property(&self, key: &str) -> Option<ConfigValue>;
}

/// 基于内存 Map 的配置源
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>, properties: HashMap<String, ConfigValue>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_property(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }
}

/// 基于进程环境变量的配置源
///
/// `pool.max-size` 形式的 key 会映射为 `POOL_MAX_SIZE` 环境变量
pub struct EnvironmentPropertySource;

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "systemEnvironment"
    }

    fn get_property(&self, key: &str) -> Option<ConfigValue> {
        let env_key: String = key
            .chars()
            .map(|c| match c {
                '.' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();
        std::env::var(env_key).ok().map(ConfigValue::String)
    }
}

/// 基于 TOML 文件的配置源
///
/// 嵌套表展开为 `a.b.c` 形式的扁平 key
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
}

impl TomlPropertySource {
    pub fn from_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ContainerError::Other(anyhow::anyhow!("cannot read '{}': {e}", path.display())))?;
        Self::from_str_named(path.display().to_string(), &content)
    }

    pub fn from_str_named(name: impl Into<String>, content: &str) -> ContainerResult<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e| ContainerError::Other(anyhow::anyhow!("invalid TOML: {e}")))?;

        let mut properties = HashMap::new();
        flatten_table(String::new(), table, &mut properties);
        Ok(Self {
            name: name.into(),
            properties,
        })
    }
}

fn flatten_table(prefix: String, table: toml::Table, out: &mut HashMap<String, ConfigValue>) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten_table(full_key, nested, out),
            other => {
                out.insert(full_key, other.into());
            }
        }
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_property(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }
}

/// 配置环境
///
/// 持有配置源链，按注册顺序查找，先注册者优先
pub struct Environment {
    sources: RwLock<Vec<Box<dyn PropertySource>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
        }
    }

    /// 添加配置源（追加到链尾）
    pub fn add_property_source(&self, source: Box<dyn PropertySource>) {
        tracing::debug!("Adding property source '{}'", source.name());
        self.sources.write().push(source);
    }

    /// 查找配置项
    pub fn get_property(&self, key: &str) -> Option<ConfigValue> {
        let sources = self.sources.read();
        for source in sources.iter() {
            if let Some(value) = source.get_property(key) {
                tracing::trace!("Property '{}' resolved from source '{}'", key, source.name());
                return Some(value);
            }
        }
        None
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_property(key)
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_property(key).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_property(key).and_then(|v| v.as_bool())
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
