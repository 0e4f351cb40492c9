// ==========================================
// 仓储货位与波次拣选系统 - 拣货路径优化
// ==========================================
// 基线: 最近邻（Nearest-Neighbor）
// - 从离起点最近的任务开始，反复前往最近的未访问任务（欧氏距离）
// - 同距离取输入顺序靠前者
// - 无坐标任务保留在序列末尾，距离记 0
// 耗时模型: 基础秒数 + 每米秒数 × 距离 + 换区罚时 + 载具校验罚时
// 分组:
// - ZONE_PICKING: 按库区分桶（库区编码升序），桶内最近邻后拼接
// - BATCH_PICKING: 先合并 (sku, 货位) 相同的任务
// - DISCRETE/WAVE_PICKING: 全量最近邻
// 复杂度: O(n²)，由波次任务数上限约束
// ==========================================

use crate::config::RouteConfig;
use crate::domain::types::WaveType;
use crate::domain::wave::PlannedPickTask;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ==========================================
// RouteStrategy - 可替换的排序策略
// ==========================================

/// 排序策略: 输入各停靠点坐标与当前位置，返回访问顺序（下标）
pub trait RouteStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn sequence(&self, positions: &[Option<(f64, f64)>], start: (f64, f64)) -> Vec<usize>;
}

/// 最近邻策略
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborRoute;

impl RouteStrategy for NearestNeighborRoute {
    fn name(&self) -> &'static str {
        "NEAREST_NEIGHBOR"
    }

    fn sequence(&self, positions: &[Option<(f64, f64)>], start: (f64, f64)) -> Vec<usize> {
        let mut unvisited: Vec<usize> = (0..positions.len())
            .filter(|&i| positions[i].is_some())
            .collect();
        let mut order = Vec::with_capacity(positions.len());
        let mut current = start;

        while !unvisited.is_empty() {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (slot, &idx) in unvisited.iter().enumerate() {
                if let Some(p) = positions[idx] {
                    let d = euclidean(current, p);
                    // 严格小于: 同距离保留输入顺序靠前者
                    if d < best_dist {
                        best_dist = d;
                        best = slot;
                    }
                }
            }
            let idx = unvisited.remove(best);
            if let Some(p) = positions[idx] {
                current = p;
            }
            order.push(idx);
        }

        order.extend((0..positions.len()).filter(|&i| positions[i].is_none()));
        order
    }
}

pub fn euclidean(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

// ==========================================
// 输出
// ==========================================

/// 合并后的停靠点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub sku_id: i64,
    pub location_id: i64,
    pub location_code: String,
    pub zone: String,
    pub quantity: i64,
    pub task_count: usize,
    pub distance_from_prev_m: f64,
    pub est_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub strategy: String,
    /// 已回填 sequence_no / distance_from_prev_m / est_seconds 的任务
    pub tasks: Vec<PlannedPickTask>,
    pub stops: Vec<RouteStop>,
    pub total_distance_m: f64,
    pub total_time_s: f64,
}

impl RouteResult {
    fn empty(strategy: &str) -> Self {
        Self {
            strategy: strategy.to_string(),
            tasks: Vec::new(),
            stops: Vec::new(),
            total_distance_m: 0.0,
            total_time_s: 0.0,
        }
    }
}

// ==========================================
// RouteOptimizer
// ==========================================
pub struct RouteOptimizer {
    config: RouteConfig,
    strategy: Box<dyn RouteStrategy>,
}

/// 合并组（同一停靠点下的任务下标）
struct StopGroup {
    members: Vec<usize>,
    position: Option<(f64, f64)>,
}

impl RouteOptimizer {
    pub fn new(config: RouteConfig) -> Self {
        Self::with_strategy(config, Box::new(NearestNeighborRoute))
    }

    pub fn with_strategy(config: RouteConfig, strategy: Box<dyn RouteStrategy>) -> Self {
        Self { config, strategy }
    }

    /// 对任务排序并回填序号、距离、耗时
    ///
    /// BATCH_PICKING 下同一停靠点的多条任务连续编号，
    /// 行走距离与耗时记在该组第一条任务上，其余记 0
    pub fn optimize(&self, tasks: Vec<PlannedPickTask>, wave_type: WaveType) -> RouteResult {
        if tasks.is_empty() {
            return RouteResult::empty(self.strategy.name());
        }

        let groups = match wave_type {
            WaveType::BatchPicking => merge_same_stop(&tasks),
            _ => tasks
                .iter()
                .enumerate()
                .map(|(i, t)| StopGroup {
                    members: vec![i],
                    position: position_of(t),
                })
                .collect(),
        };

        let buckets: Vec<Vec<usize>> = match wave_type {
            WaveType::ZonePicking => {
                let mut by_zone: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
                for (gi, g) in groups.iter().enumerate() {
                    by_zone
                        .entry(tasks[g.members[0]].zone.as_str())
                        .or_default()
                        .push(gi);
                }
                by_zone.into_values().collect()
            }
            _ => vec![(0..groups.len()).collect()],
        };

        let mut current = (self.config.origin_x, self.config.origin_y);
        let mut prev_zone: Option<String> = None;
        let mut visit: Vec<(usize, f64, f64)> = Vec::with_capacity(groups.len());

        for bucket in buckets {
            let positions: Vec<Option<(f64, f64)>> =
                bucket.iter().map(|&gi| groups[gi].position).collect();
            for local in self.strategy.sequence(&positions, current) {
                let gi = bucket[local];
                let group = &groups[gi];
                let head = &tasks[group.members[0]];

                let distance = match group.position {
                    Some(p) => {
                        let d = euclidean(current, p);
                        current = p;
                        d
                    }
                    None => 0.0,
                };
                let zone_changed = prev_zone.as_deref().map_or(false, |z| z != head.zone);
                let has_unit_load = group.members.iter().any(|&i| tasks[i].unit_load_id.is_some());
                let seconds = self.step_seconds(distance, zone_changed, has_unit_load);
                prev_zone = Some(head.zone.clone());
                visit.push((gi, distance, seconds));
            }
        }

        let mut slots: Vec<Option<PlannedPickTask>> = tasks.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(slots.len());
        let mut stops = Vec::with_capacity(visit.len());
        let mut total_distance_m = 0.0;
        let mut total_time_s = 0.0;

        for (gi, distance, seconds) in visit {
            total_distance_m += distance;
            total_time_s += seconds;
            let mut stop: Option<RouteStop> = None;

            for (k, &ti) in groups[gi].members.iter().enumerate() {
                let Some(mut task) = slots[ti].take() else {
                    continue;
                };
                task.sequence_no = ordered.len() as i32 + 1;
                if k == 0 {
                    task.distance_from_prev_m = distance;
                    task.est_seconds = seconds;
                } else {
                    task.distance_from_prev_m = 0.0;
                    task.est_seconds = 0.0;
                }
                match stop.as_mut() {
                    Some(s) => {
                        s.quantity += task.requested_qty;
                        s.task_count += 1;
                    }
                    None => {
                        stop = Some(RouteStop {
                            sku_id: task.sku_id,
                            location_id: task.location_id,
                            location_code: task.location_code.clone(),
                            zone: task.zone.clone(),
                            quantity: task.requested_qty,
                            task_count: 1,
                            distance_from_prev_m: distance,
                            est_seconds: seconds,
                        })
                    }
                }
                ordered.push(task);
            }
            stops.extend(stop);
        }

        debug!(
            strategy = self.strategy.name(),
            wave_type = %wave_type,
            tasks = ordered.len(),
            stops = stops.len(),
            total_distance_m,
            total_time_s,
            "路径优化完成"
        );

        RouteResult {
            strategy: self.strategy.name().to_string(),
            tasks: ordered,
            stops,
            total_distance_m,
            total_time_s,
        }
    }

    fn step_seconds(&self, distance_m: f64, zone_changed: bool, has_unit_load: bool) -> f64 {
        let mut seconds = self.config.base_seconds + self.config.seconds_per_meter * distance_m;
        if zone_changed {
            seconds += self.config.zone_change_seconds;
        }
        if has_unit_load {
            seconds += self.config.unit_load_seconds;
        }
        seconds
    }
}

fn position_of(task: &PlannedPickTask) -> Option<(f64, f64)> {
    match (task.x, task.y) {
        (Some(x), Some(y)) => Some((x, y)),
        _ => None,
    }
}

/// 按 (sku, 货位) 合并，组序按首次出现
fn merge_same_stop(tasks: &[PlannedPickTask]) -> Vec<StopGroup> {
    let mut index: BTreeMap<(i64, i64), usize> = BTreeMap::new();
    let mut groups: Vec<StopGroup> = Vec::new();
    for (i, t) in tasks.iter().enumerate() {
        match index.get(&(t.sku_id, t.location_id)) {
            Some(&gi) => groups[gi].members.push(i),
            None => {
                index.insert((t.sku_id, t.location_id), groups.len());
                groups.push(StopGroup {
                    members: vec![i],
                    position: position_of(t),
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(line_id: i64, sku_id: i64, location_id: i64, zone: &str, pos: Option<(f64, f64)>) -> PlannedPickTask {
        PlannedPickTask {
            order_id: 1,
            line_id,
            tenant_id: 1,
            sku_id,
            location_id,
            location_code: format!("L{}", location_id),
            zone: zone.to_string(),
            x: pos.map(|p| p.0),
            y: pos.map(|p| p.1),
            unit_load_id: None,
            requested_qty: 2,
            sequence_no: 0,
            distance_from_prev_m: 0.0,
            est_seconds: 0.0,
        }
    }

    fn optimizer() -> RouteOptimizer {
        RouteOptimizer::new(RouteConfig::default())
    }

    #[test]
    fn test_empty_input_gives_empty_route() {
        let result = optimizer().optimize(Vec::new(), WaveType::WavePicking);
        assert!(result.tasks.is_empty());
        assert_eq!(result.total_distance_m, 0.0);
        assert_eq!(result.total_time_s, 0.0);
    }

    #[test]
    fn test_nearest_neighbor_sequence_and_time() {
        let tasks = vec![
            task(3, 1, 3, "A", Some((10.0, 0.0))),
            task(1, 1, 1, "A", Some((0.0, 0.0))),
            task(2, 1, 2, "A", Some((3.0, 4.0))),
        ];
        let result = optimizer().optimize(tasks, WaveType::WavePicking);

        let lines: Vec<i64> = result.tasks.iter().map(|t| t.line_id).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        let seqs: Vec<i32> = result.tasks.iter().map(|t| t.sequence_no).collect();
        assert_eq!(seqs, vec![1, 2, 3]);

        assert_eq!(result.tasks[0].distance_from_prev_m, 0.0);
        assert!((result.tasks[1].distance_from_prev_m - 5.0).abs() < 1e-9);
        assert!((result.tasks[2].distance_from_prev_m - 65f64.sqrt()).abs() < 1e-9);
        assert!((result.total_distance_m - (5.0 + 65f64.sqrt())).abs() < 1e-9);

        // 30 + 0；30 + 10；30 + 2√65
        let expected_time = 90.0 + 2.0 * (5.0 + 65f64.sqrt());
        assert!((result.total_time_s - expected_time).abs() < 1e-9);
    }

    #[test]
    fn test_total_distance_matches_reference_path() {
        let tasks = vec![
            task(1, 1, 1, "A", Some((0.0, 0.0))),
            task(2, 1, 2, "A", Some((3.0, 4.0))),
            task(3, 1, 3, "A", Some((10.0, 2.0))),
        ];
        let result = optimizer().optimize(tasks, WaveType::DiscretePicking);
        assert!((result.tasks[2].distance_from_prev_m - 53f64.sqrt()).abs() < 1e-9);
        assert!((result.total_distance_m - 12.28).abs() < 0.01);
    }

    #[test]
    fn test_zone_change_and_unit_load_penalties() {
        let mut b = task(2, 1, 2, "B", Some((0.0, 0.0)));
        b.unit_load_id = Some(9);
        let tasks = vec![task(1, 1, 1, "A", Some((0.0, 0.0))), b];
        let result = optimizer().optimize(tasks, WaveType::WavePicking);
        assert_eq!(result.tasks[0].est_seconds, 30.0);
        assert_eq!(result.tasks[1].est_seconds, 30.0 + 15.0 + 10.0);
    }

    #[test]
    fn test_unplaced_tasks_kept_at_end_with_zero_distance() {
        let tasks = vec![
            task(1, 1, 1, "A", None),
            task(2, 1, 2, "A", Some((1.0, 0.0))),
        ];
        let result = optimizer().optimize(tasks, WaveType::WavePicking);
        let lines: Vec<i64> = result.tasks.iter().map(|t| t.line_id).collect();
        assert_eq!(lines, vec![2, 1]);
        assert_eq!(result.tasks[1].distance_from_prev_m, 0.0);
        assert_eq!(result.total_distance_m, 1.0);
    }

    #[test]
    fn test_zone_picking_routes_each_zone_in_turn() {
        let tasks = vec![
            task(1, 1, 1, "B", Some((1.0, 0.0))),
            task(2, 1, 2, "A", Some((50.0, 0.0))),
            task(3, 1, 3, "A", Some((40.0, 0.0))),
        ];
        let result = optimizer().optimize(tasks, WaveType::ZonePicking);
        let lines: Vec<i64> = result.tasks.iter().map(|t| t.line_id).collect();
        assert_eq!(lines, vec![3, 2, 1]);
        assert!((result.total_distance_m - (40.0 + 10.0 + 49.0)).abs() < 1e-9);
    }

    #[test]
    fn test_batch_picking_merges_same_stop() {
        let tasks = vec![
            task(1, 7, 1, "A", Some((3.0, 4.0))),
            task(2, 8, 2, "A", Some((6.0, 8.0))),
            task(3, 7, 1, "A", Some((3.0, 4.0))),
        ];
        let result = optimizer().optimize(tasks, WaveType::BatchPicking);

        assert_eq!(result.stops.len(), 2);
        assert_eq!(result.stops[0].quantity, 4);
        assert_eq!(result.stops[0].task_count, 2);

        let lines: Vec<i64> = result.tasks.iter().map(|t| t.line_id).collect();
        assert_eq!(lines, vec![1, 3, 2]);
        assert_eq!(result.tasks[1].distance_from_prev_m, 0.0);
        assert_eq!(result.tasks[1].est_seconds, 0.0);
        assert!((result.total_distance_m - 10.0).abs() < 1e-9);
        assert!((result.total_time_s - (60.0 + 20.0)).abs() < 1e-9);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let positions = vec![Some((1.0, 0.0)), Some((0.0, 1.0)), Some((-1.0, 0.0))];
        let order = NearestNeighborRoute.sequence(&positions, (0.0, 0.0));
        assert_eq!(order[0], 0);
    }
}
