// ==========================================
// 分类信息导入系统 - 导入报告
// ==========================================
// 用途: 一次导入运行的汇总统计与逐行失败记录
// ==========================================

use crate::domain::listing::{FieldChange, Listing};
use crate::domain::types::{ListingType, Mode};
use serde::{Deserialize, Serialize};

// ==========================================
// RowAction - 单行处理结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    Created,                                   // update: 新建
    Updated { changes: Vec<FieldChange> },     // update: 合并后有变化
    Unchanged,                                 // update / dry-run: 合并后无变化（不写库）
    WouldCreate,                               // dry-run: 将新建
    WouldUpdate { changes: Vec<FieldChange> }, // dry-run: 将更新
    Exists,                                    // skip: 已存在
    Missing,                                   // skip: 不存在
}

/// 单行处理结果（汇总计数使用; 后置钩子只接收其中的条目）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOutcome {
    pub row_number: usize,
    pub listing: Listing, // dry-run / skip 下可能为未持久化的临时条目
    pub action: RowAction,
}

/// 失败或被跳过的行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row_number: usize,
    pub title: Option<String>,
    pub reason: String,
}

// ==========================================
// ImportSummary - 汇总统计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub would_create: usize,
    pub would_update: usize,
    pub existing: usize,
    pub missing: usize,
    pub malformed: usize,
    pub failed: usize,
    pub dropped_images: usize,
}

impl ImportSummary {
    /// 累计单行结果
    pub fn record(&mut self, action: &RowAction) {
        self.processed += 1;
        match action {
            RowAction::Created => self.created += 1,
            RowAction::Updated { .. } => self.updated += 1,
            RowAction::Unchanged => self.unchanged += 1,
            RowAction::WouldCreate => self.would_create += 1,
            RowAction::WouldUpdate { .. } => self.would_update += 1,
            RowAction::Exists => self.existing += 1,
            RowAction::Missing => self.missing += 1,
        }
    }
}

// ==========================================
// ImportReport - 导入报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: String,
    pub mode: Mode,
    pub default_listing_type: ListingType,
    pub summary: ImportSummary,
    pub malformed_rows: Vec<RowFailure>,
    pub failed_rows: Vec<RowFailure>,
    pub cancelled: bool,
    pub elapsed_ms: u128,
}
