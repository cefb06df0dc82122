// ==========================================
// 分类信息导入系统 - 导入模式
// ==========================================
// 职责: 保存当前模式 {dry-run, update, skip}, 供下游所有决策查询
// 红线: 非法值立即失败, 且不改变原模式
// ==========================================

use crate::domain::types::Mode;
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterMode {
    mode: Mode,
}

impl ImporterMode {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// 设置模式（大小写敏感）
    ///
    /// # 返回
    /// - Err(InvalidMode): 值非法, 原模式保持不变
    pub fn set_mode(&mut self, value: &str) -> ImportResult<()> {
        let mode = Mode::parse(value).ok_or_else(|| ImportError::InvalidMode(value.to_string()))?;
        self.mode = mode;
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == Mode::DryRun
    }

    pub fn is_update(&self) -> bool {
        self.mode == Mode::Update
    }

    pub fn is_skip(&self) -> bool {
        self.mode == Mode::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(m: &ImporterMode) -> [bool; 3] {
        [m.is_dry_run(), m.is_update(), m.is_skip()]
    }

    #[test]
    fn test_default_is_update() {
        let m = ImporterMode::default();
        assert_eq!(flags(&m), [false, true, false]);
    }

    #[test]
    fn test_valid_modes_are_exclusive() {
        let cases = [
            ("dry-run", [true, false, false]),
            ("update", [false, true, false]),
            ("skip", [false, false, true]),
        ];
        for (value, expected) in cases {
            let mut m = ImporterMode::default();
            m.set_mode(value).unwrap();
            assert_eq!(flags(&m), expected, "mode {}", value);
            assert_eq!(flags(&m).iter().filter(|f| **f).count(), 1);
        }
    }

    #[test]
    fn test_invalid_mode_keeps_previous() {
        let mut m = ImporterMode::default();
        m.set_mode("skip").unwrap();

        for bad in ["", "DRY-RUN", "Skip", "delete", "dry_run"] {
            let err = m.set_mode(bad).unwrap_err();
            assert!(matches!(err, ImportError::InvalidMode(ref v) if v == bad));
            assert!(m.is_skip());
        }
    }
}
