//! 页池参数与布局计算。
//!
//! # 设计背景（Why）
//! - 采集程序的页池参数来自配置文件；与其在构造函数里散落校验逻辑，不如集中在
//!   [`PoolConfig::layout`]，由构造器与配置加载共用同一套规则。
//!
//! # 布局规则（What）
//! - `page_size >= 32`（帧头预留空间），`page_count > 0`；
//! - 配置的 `base_size == 0` 且内存块也未声明长度时：按“首页偏移 + 页数 × 页尺寸”推算，页数保持请求值；
//! - 内存块声明了长度 0（例如空的堆分配）不等于未声明，一律以 `BlockTooSmall` 拒绝；
//! - 声明了 `base_size` 时，实际页数为 `min(page_count, (base_size - first_page_offset) / page_size)`，
//!   且要求 `first_page_offset < base_size`；实际页数为 0 视为构造失败。

use serde::Deserialize;

use crate::{error::PoolError, pool::HEADER_RESERVED_SPACE};

/// 页池参数。
///
/// TOML 示例：
/// ```toml
/// page-size = 8192
/// page-count = 1000
/// base-size = 8388608
/// first-page-offset = 0
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PoolConfig {
    /// 单页字节数。
    pub page_size: usize,
    /// 请求的页数。
    pub page_count: usize,
    /// 内存块字节数；0 表示未声明。
    #[serde(default)]
    pub base_size: usize,
    /// 首页相对块基址的偏移。
    #[serde(default)]
    pub first_page_offset: usize,
}

/// 经过校验的页池布局。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolLayout {
    /// 单页字节数。
    pub page_size: usize,
    /// 实际页数。
    pub page_count: usize,
    /// 内存块字节数（已推算）。
    pub base_size: usize,
    /// 首页偏移。
    pub first_page_offset: usize,
}

impl PoolLayout {
    /// 单页可用负载字节数。
    pub fn max_payload_size(&self) -> usize {
        self.page_size - HEADER_RESERVED_SPACE
    }
}

impl PoolConfig {
    /// 以页尺寸与页数构造参数，其余取默认值。
    pub fn new(page_size: usize, page_count: usize) -> Self {
        Self {
            page_size,
            page_count,
            base_size: 0,
            first_page_offset: 0,
        }
    }

    /// 从 TOML 文本解析并校验。
    pub fn from_toml_str(text: &str) -> Result<Self, PoolError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验参数，不关心底层内存块。
    pub fn validate(&self) -> Result<(), PoolError> {
        self.layout(None).map(|_| ())
    }

    /// 结合内存块的已知长度（`None` 表示未知）计算布局。
    ///
    /// 配置中的 `base_size` 优先；若二者都已知，配置值不得超过内存块长度。
    pub fn layout(&self, block_size: Option<usize>) -> Result<PoolLayout, PoolError> {
        if self.page_size == 0 {
            return Err(invalid("page_size", "必须大于 0"));
        }
        if self.page_count == 0 {
            return Err(invalid("page_count", "必须大于 0"));
        }
        if self.page_size < HEADER_RESERVED_SPACE {
            return Err(PoolError::PageTooSmall {
                page_size: self.page_size,
                reserved: HEADER_RESERVED_SPACE,
            });
        }
        if let Some(block_size) = block_size
            && self.base_size != 0
            && self.base_size > block_size
        {
            return Err(invalid(
                "base_size",
                format!("{} 超过内存块长度 {block_size}", self.base_size),
            ));
        }

        let declared = match (self.base_size, block_size) {
            (0, known) => known,
            (configured, _) => Some(configured),
        };

        let Some(declared) = declared else {
            let base_size = self
                .page_count
                .checked_mul(self.page_size)
                .and_then(|pages| pages.checked_add(self.first_page_offset))
                .ok_or_else(|| invalid("page_count", "页数 × 页尺寸溢出"))?;
            return Ok(PoolLayout {
                page_size: self.page_size,
                page_count: self.page_count,
                base_size,
                first_page_offset: self.first_page_offset,
            });
        };

        if declared > 0 && self.first_page_offset >= declared {
            return Err(invalid(
                "first_page_offset",
                format!("{} 不小于内存块长度 {declared}", self.first_page_offset),
            ));
        }
        let fitting = declared.saturating_sub(self.first_page_offset) / self.page_size;
        let page_count = self.page_count.min(fitting);
        if page_count == 0 {
            return Err(PoolError::BlockTooSmall {
                base_size: declared,
                first_page_offset: self.first_page_offset,
                page_size: self.page_size,
            });
        }
        Ok(PoolLayout {
            page_size: self.page_size,
            page_count,
            base_size: declared,
            first_page_offset: self.first_page_offset,
        })
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> PoolError {
    PoolError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_base_size_caps_page_count() {
        let config = PoolConfig {
            page_size: 1024,
            page_count: 10,
            base_size: 10_000,
            first_page_offset: 0,
        };
        let layout = config.layout(None).expect("布局合法");
        assert_eq!(layout.page_count, 9);
        assert_eq!(layout.max_payload_size(), 1024 - 32);
    }

    #[test]
    fn undeclared_base_size_keeps_requested_count() {
        let config = PoolConfig {
            first_page_offset: 100,
            ..PoolConfig::new(64, 4)
        };
        let layout = config.layout(None).expect("布局合法");
        assert_eq!(layout.page_count, 4);
        assert_eq!(layout.base_size, 100 + 4 * 64);
    }

    #[test]
    fn block_size_is_used_when_config_is_silent() {
        let layout = PoolConfig::new(64, 100).layout(Some(200)).expect("布局合法");
        assert_eq!(layout.page_count, 3);
        assert_eq!(layout.base_size, 200);
    }

    #[test]
    fn rejects_degenerate_parameters() {
        assert!(matches!(
            PoolConfig::new(16, 4).layout(None),
            Err(PoolError::PageTooSmall { page_size: 16, .. })
        ));
        assert!(matches!(
            PoolConfig::new(64, 0).validate(),
            Err(PoolError::InvalidConfig { field: "page_count", .. })
        ));
        assert!(matches!(
            PoolConfig::new(64, 4).layout(Some(63)),
            Err(PoolError::BlockTooSmall { .. })
        ));
        assert!(matches!(
            PoolConfig::new(64, 4).layout(Some(0)),
            Err(PoolError::BlockTooSmall { base_size: 0, .. })
        ));
        let offset_past_end = PoolConfig {
            first_page_offset: 128,
            ..PoolConfig::new(64, 4)
        };
        assert!(matches!(
            offset_past_end.layout(Some(128)),
            Err(PoolError::InvalidConfig { field: "first_page_offset", .. })
        ));
    }

    #[test]
    fn parses_kebab_case_toml() {
        let config = PoolConfig::from_toml_str("page-size = 8192\npage-count = 16\n")
            .expect("TOML 合法");
        assert_eq!(config, PoolConfig::new(8192, 16));
        assert!(matches!(
            PoolConfig::from_toml_str("page-size = 8192\npages = 16\n"),
            Err(PoolError::ConfigParse(_))
        ));
    }
}
