//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 按时间范围分区的管理器
//!
//! 负责把任意时刻映射到固定跨度的分区窗口、按需补齐缺失分区、
//! 预创建未来分区以及按时间或数量清理过期分区。
//!
//! 同一管理器内的所有操作由一把异步锁串行化，因此同一进程内对同一张表
//! 不会并发计算出重叠的窗口；跨进程的竞争仍由存储层拒绝重叠边界，
//! 以 [`PartitionError::Overlap`] 的形式报告给调用方，不做重试。

use crate::database::{PartitionAdapter, PartitionName, PartitionRange};
use crate::error::{PartitionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use super::{
    validate_period, ActiveRangeSet, PartitionConfig, PartitionManager, PartitionValue,
    RetentionPolicy,
};

#[derive(Debug, Default)]
struct ManagerState {
    active: ActiveRangeSet,
    /// 最新分区的上界，首次计算后缓存
    latest_coverage: Option<DateTime<Utc>>,
}

/// 时间范围分区管理器
pub struct TimeRangePartitionManager {
    config: PartitionConfig,
    adapter: Arc<dyn PartitionAdapter>,
    state: Mutex<ManagerState>,
    clock: fn() -> DateTime<Utc>,
}

impl TimeRangePartitionManager {
    pub fn new(config: PartitionConfig, adapter: Arc<dyn PartitionAdapter>) -> Self {
        Self {
            config,
            adapter,
            state: Mutex::new(ManagerState::default()),
            clock: Utc::now,
        }
    }

    /// 替换时间来源（测试用）
    #[doc(hidden)]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn adapter(&self) -> &Arc<dyn PartitionAdapter> {
        &self.adapter
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().await
    }

    /// 重新枚举分区并整体重建缓存，返回枚举到的分区名
    async fn refresh(&self, state: &mut ManagerState) -> Result<Vec<String>> {
        let names = self.adapter.list_partitions().await?;
        state
            .active
            .replace_from_names(&self.config.table_name, &names)?;
        debug!(
            table = %self.config.table_name,
            partitions = names.len(),
            "Reloaded active partition ranges"
        );
        Ok(names)
    }

    async fn ensure_populated(&self, state: &mut ManagerState) -> Result<()> {
        if !state.active.is_populated() {
            self.refresh(state).await?;
        }
        Ok(())
    }

    /// 当前缓存的活跃分区范围（首次调用时从适配器加载）
    pub async fn active_ranges(&self) -> Result<Vec<PartitionRange>> {
        let mut state = self.lock().await;
        self.ensure_populated(&mut state).await?;
        Ok(state.active.ranges().to_vec())
    }

    /// 强制重新枚举分区并重建缓存
    pub async fn reload_active_ranges(&self) -> Result<Vec<PartitionRange>> {
        let mut state = self.lock().await;
        self.refresh(&mut state).await?;
        Ok(state.active.ranges().to_vec())
    }

    /// 用给定的分区名重建缓存
    pub async fn reload_active_ranges_from<S: AsRef<str> + Sync>(
        &self,
        partition_names: &[S],
    ) -> Result<Vec<PartitionRange>> {
        let mut state = self.lock().await;
        state
            .active
            .replace_from_names(&self.config.table_name, partition_names)?;
        Ok(state.active.ranges().to_vec())
    }

    /// 缓存的活跃分区是否覆盖给定时刻
    ///
    /// 只在缓存从未填充时才访问适配器，其余情况允许使用旧缓存。
    pub async fn covers_instant(&self, instant: DateTime<Utc>) -> Result<bool> {
        let mut state = self.lock().await;
        self.ensure_populated(&mut state).await?;
        Ok(state.active.covers(instant))
    }

    /// 重新枚举分区，取 `unix_to` 最大的分区上界
    ///
    /// 没有任何分区时返回当前UTC整点，作为首个分区的对齐锚点。
    async fn compute_latest_coverage(&self, state: &mut ManagerState) -> Result<DateTime<Utc>> {
        let names = self.refresh(state).await?;

        let mut latest: Option<DateTime<Utc>> = None;
        for name in &names {
            let end = PartitionName::parse(&self.config.table_name, name)?.to();
            latest = Some(latest.map_or(end, |l| l.max(end)));
        }

        match latest {
            Some(end) => {
                state.latest_coverage = Some(end);
                Ok(end)
            }
            None => start_of_hour(self.now()),
        }
    }

    async fn latest_coverage_locked(&self, state: &mut ManagerState) -> Result<DateTime<Utc>> {
        if let Some(latest) = state.latest_coverage {
            return Ok(latest);
        }
        let latest = self.compute_latest_coverage(state).await?;
        state.latest_coverage = Some(latest);
        Ok(latest)
    }

    /// 最新分区的覆盖上界（首次计算后缓存）
    pub async fn latest_coverage_time(&self) -> Result<DateTime<Utc>> {
        let mut state = self.lock().await;
        self.latest_coverage_locked(&mut state).await
    }

    /// 重新枚举分区计算最新覆盖上界
    pub async fn refresh_latest_coverage_time(&self) -> Result<DateTime<Utc>> {
        let mut state = self.lock().await;
        self.compute_latest_coverage(&mut state).await
    }

    /// 生成分区名
    pub fn build_partition_name(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PartitionName> {
        PartitionName::build(&self.config.table_name, from, to)
    }

    async fn create_locked(
        &self,
        state: &mut ManagerState,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PartitionName> {
        let name = self.build_partition_name(from, to)?;
        info!(
            table = %self.config.table_name,
            partition = %name,
            from = %name.from(),
            to = %name.to(),
            "Creating partition"
        );

        if let Err(e) = self
            .adapter
            .create_partition_by_range(name.as_str(), name.from(), name.to())
            .await
        {
            state.active.invalidate();
            return Err(e);
        }

        self.refresh(state).await?;
        Ok(name)
    }

    /// 创建 `[from, to)` 分区并重建缓存
    ///
    /// 与已有分区重叠时存储层会拒绝，错误原样返回。
    #[instrument(skip(self), fields(table = %self.config.table_name))]
    pub async fn create_partition(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PartitionName> {
        let mut state = self.lock().await;
        self.create_locked(&mut state, from, to).await
    }

    /// 确保存在覆盖 `value` 的分区
    ///
    /// 从最新覆盖上界出发按整数个 `period` 前移或后移，得到包含 `value` 的窗口
    /// `[from, from + period)` 并创建。已覆盖时返回 `None`。
    #[instrument(skip(self), fields(table = %self.config.table_name))]
    pub async fn ensure_coverage(
        &self,
        value: DateTime<Utc>,
        period: Duration,
    ) -> Result<Option<PartitionName>> {
        validate_period(period)?;

        let mut state = self.lock().await;
        self.ensure_populated(&mut state).await?;
        if state.active.covers(value) {
            return Ok(None);
        }

        let anchor = self.latest_coverage_locked(&mut state).await?;
        let (from, to) = window_containing(anchor, value, period)?;
        debug!(%anchor, %from, %to, "Computed missing partition window");

        self.create_locked(&mut state, from, to).await.map(Some)
    }

    /// 从 `from`（默认为最新覆盖上界）开始连续创建分区，
    /// 直到覆盖到 `(from 或 当前时间) + period * count`
    ///
    /// 每次循环都直接尝试创建，已存在的同名分区由存储层忽略。
    #[instrument(skip(self), fields(table = %self.config.table_name))]
    pub async fn premake_from(
        &self,
        period: Duration,
        count: u32,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>> {
        validate_period(period)?;
        let span = period
            .checked_mul(i32::try_from(count).map_err(|_| {
                PartitionError::InvalidInput(format!("Premake count {} is too large", count))
            })?)
            .ok_or_else(|| PartitionError::InvalidInput("Premake span overflows".to_string()))?;

        let mut state = self.lock().await;
        let target = checked_add(from.unwrap_or_else(|| self.now()), span)?;
        let mut cursor = match from {
            Some(from) => from,
            None => self.compute_latest_coverage(&mut state).await?,
        };

        let mut created = Vec::new();
        while cursor < target {
            let next = checked_add(cursor, period)?;
            let name = self.create_locked(&mut state, cursor, next).await?;
            created.push(name.into_string());
            cursor = next;
        }

        info!(
            table = %self.config.table_name,
            count = created.len(),
            "Premade partitions"
        );
        Ok(created)
    }

    /// 保留 `count` 个跨度为 `period` 的历史窗口：
    /// 删除上界早于 `from - period * (count + 1)` 的分区
    pub async fn retain(
        &self,
        period: Duration,
        count: u32,
        from: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        validate_period(period)?;
        let windows = i32::try_from(count)
            .ok()
            .and_then(|c| c.checked_add(1))
            .ok_or_else(|| PartitionError::InvalidInput(format!("Retain count {} is too large", count)))?;
        let span = period
            .checked_mul(windows)
            .ok_or_else(|| PartitionError::InvalidInput("Retention span overflows".to_string()))?;
        let cutoff = from
            .checked_sub_signed(span)
            .ok_or_else(|| PartitionError::InvalidInput("Retention cutoff overflows".to_string()))?;

        self.retain_by_time(cutoff).await
    }

    /// 删除上界早于 `cutoff` 的所有分区
    #[instrument(skip(self), fields(table = %self.config.table_name))]
    pub async fn retain_by_time(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let mut state = self.lock().await;
        let names = self.adapter.list_partitions().await?;
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut prunable = Vec::new();
        for name in names {
            let parsed = PartitionName::parse(&self.config.table_name, &name)?;
            if parsed.to() < cutoff {
                prunable.push(name);
            }
        }

        self.remove_locked(&mut state, &prunable).await
    }

    /// 保留最近的 `retain_count` 个历史分区，外加当前正在写入的分区
    ///
    /// 以 `[now, now + 1h)` 生成的分区名作为“当前”的比较基准，名字不大于它的
    /// 分区视为历史分区。依赖分区名字典序与时间顺序一致。
    #[instrument(skip(self), fields(table = %self.config.table_name))]
    pub async fn retain_by_count(&self, retain_count: usize) -> Result<Vec<String>> {
        let mut state = self.lock().await;
        let names = self.adapter.list_partitions().await?;
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.now();
        let current = self.build_partition_name(now, checked_add(now, Duration::hours(1))?)?;

        let mut past: Vec<String> = names
            .into_iter()
            .filter(|name| name.as_str() <= current.as_str())
            .collect();
        past.sort();

        let keep = retain_count.saturating_add(1);
        let prune_len = past.len().saturating_sub(keep);
        past.truncate(prune_len);

        self.remove_locked(&mut state, &past).await
    }

    async fn remove_locked(
        &self,
        state: &mut ManagerState,
        partition_names: &[String],
    ) -> Result<Vec<String>> {
        for name in partition_names {
            info!(table = %self.config.table_name, partition = %name, "Removing partition");
            let result = match self.adapter.detach_partition(name).await {
                Ok(()) => self.adapter.drop_partition(name).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(partition = %name, error = %e, "Failed to remove partition");
                state.active.invalidate();
                return Err(e);
            }
        }

        self.refresh(state).await?;
        Ok(partition_names.to_vec())
    }

    /// 逐个分离并删除分区，全部完成后重建一次缓存
    #[instrument(skip(self), fields(table = %self.config.table_name))]
    pub async fn remove_partitions(&self, partition_names: &[String]) -> Result<Vec<String>> {
        let mut state = self.lock().await;
        self.remove_locked(&mut state, partition_names).await
    }

    /// 枚举当前所有分区，按名字（即时间）排序
    pub async fn partition_names(&self) -> Result<Vec<PartitionName>> {
        let names = self.adapter.list_partitions().await?;
        let mut parsed = names
            .iter()
            .map(|name| PartitionName::parse(&self.config.table_name, name))
            .collect::<Result<Vec<_>>>()?;
        parsed.sort();
        Ok(parsed)
    }
}

#[async_trait]
impl PartitionManager for TimeRangePartitionManager {
    fn config(&self) -> &PartitionConfig {
        &self.config
    }

    async fn ensure_partition(&self, value: &PartitionValue) -> Result<()> {
        match value {
            PartitionValue::Timestamp(instant) => {
                self.ensure_coverage(*instant, self.config.partition_period)
                    .await?;
                Ok(())
            }
        }
    }

    async fn covers(&self, value: &PartitionValue) -> Result<bool> {
        match value {
            PartitionValue::Timestamp(instant) => self.covers_instant(*instant).await,
        }
    }

    async fn premake(&self, count: u32) -> Result<Vec<String>> {
        self.premake_from(self.config.partition_period, count, None)
            .await
    }

    async fn delete_expired_partitions(&self) -> Result<Vec<String>> {
        match self.config.retention {
            Some(RetentionPolicy::Period(period)) => {
                let cutoff = self.now().checked_sub_signed(period).ok_or_else(|| {
                    PartitionError::InvalidInput("Retention cutoff overflows".to_string())
                })?;
                self.retain_by_time(cutoff).await
            }
            Some(RetentionPolicy::Count(count)) => self.retain_by_count(count).await,
            None => Ok(Vec::new()),
        }
    }

    async fn partitions(&self) -> Result<Vec<PartitionName>> {
        self.partition_names().await
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// 计算包含 `value` 的窗口 `[from, to)`，其中 `from = anchor + k * period`
///
/// 以整秒计算并向下取整，保证 `from <= value < to`。
pub(crate) fn window_containing(
    anchor: DateTime<Utc>,
    value: DateTime<Utc>,
    period: Duration,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let overflow = || PartitionError::InvalidInput(format!("Partition window for {} overflows", value));

    let period_secs = period.num_seconds();
    let diff = value
        .timestamp()
        .checked_sub(anchor.timestamp())
        .ok_or_else(overflow)?
        .div_euclid(period_secs);
    let offset = diff
        .checked_mul(period_secs)
        .and_then(Duration::try_seconds)
        .ok_or_else(overflow)?;

    let from = anchor.checked_add_signed(offset).ok_or_else(overflow)?;
    let to = from.checked_add_signed(period).ok_or_else(overflow)?;
    Ok((from, to))
}

fn checked_add(instant: DateTime<Utc>, delta: Duration) -> Result<DateTime<Utc>> {
    instant
        .checked_add_signed(delta)
        .ok_or_else(|| PartitionError::InvalidInput(format!("{} + {} overflows", instant, delta)))
}

fn start_of_hour(instant: DateTime<Utc>) -> Result<DateTime<Utc>> {
    instant
        .duration_trunc(Duration::hours(1))
        .map_err(|e| PartitionError::InvalidInput(format!("Cannot truncate {}: {}", instant, e)))
}
