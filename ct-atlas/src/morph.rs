//! 3D 二值形态学操作.
//!
//! 所有操作都使用 6-邻域 (钻石型, 即前后上下左右) 结构元素.

use crate::consts::gray::{is_background, FOREGROUND};
use crate::volume::{LabelVolume, Volume};
use crate::Idx3d;
use ndarray::{Array3, Axis};
use std::collections::VecDeque;

/// 获取 `pos` 前后上下左右六个点的坐标.
///
/// 在 `shape` 范围外的坐标会被过滤掉, 不会包含在返回值中.
fn diamond_neighbours((l, m, n): Idx3d, shape: Idx3d) -> impl Iterator<Item = Idx3d> {
    [
        (l.wrapping_sub(1), m, n),
        (l.saturating_add(1), m, n),
        (l, m.wrapping_sub(1), n),
        (l, m.saturating_add(1), n),
        (l, m, n.wrapping_sub(1)),
        (l, m, n.saturating_add(1)),
    ]
    .into_iter()
    .filter(move |&(a, b, c)| a < shape.0 && b < shape.1 && c < shape.2)
}

/// 判断 `pos` 是否位于长方体的六个表面上.
#[inline]
fn is_at_border((l, m, n): Idx3d, (sl, sm, sn): Idx3d) -> bool {
    l == 0 || m == 0 || n == 0 || l + 1 == sl || m + 1 == sm || n + 1 == sn
}

/// 将三维数据中的背景空洞填充为 `fill`. 返回被填充的体素个数.
///
/// 背景空洞指不能通过 6-相邻背景路径连通到长方体表面的背景体素.
/// 因此, 任一维度长度不超过 2 的数据不存在空洞.
pub fn fill_holes_by<T: Copy>(data: &mut Array3<T>, is_bg: impl Fn(T) -> bool, fill: T) -> usize {
    let shape = data.dim();
    let mut outside = Array3::<bool>::from_elem(shape, false);
    let mut q: VecDeque<Idx3d> = data
        .indexed_iter()
        .filter_map(|(pos, &v)| (is_bg(v) && is_at_border(pos, shape)).then_some(pos))
        .collect();
    q.iter().for_each(|&pos| outside[pos] = true);

    // bfs
    while let Some(cur) = q.pop_front() {
        for neigh in diamond_neighbours(cur, shape) {
            if !outside[neigh] && is_bg(data[neigh]) {
                outside[neigh] = true;
                q.push_back(neigh);
            }
        }
    }

    let mut cnt = 0usize;
    ndarray::Zip::from(data).and(&outside).for_each(|v, &o| {
        if !o && is_bg(*v) {
            *v = fill;
            cnt += 1;
        }
    });
    cnt
}

/// 将二值标签体积中的背景空洞填充为前景. 返回被填充的体素个数.
///
/// 该操作是幂等的: 对结果再次调用不会修改任何体素.
#[inline]
pub fn fill_holes(label: &mut LabelVolume) -> usize {
    fill_holes_by(label, is_background, FOREGROUND)
}

/// 将布尔掩膜中的 `false` 空洞填充为 `true`. 返回被填充的体素个数.
#[inline]
pub fn fill_holes_mask(mask: &mut Array3<bool>) -> usize {
    fill_holes_by(mask, |b| !b, true)
}

/// 以 6-邻域为结构元素, 对掩膜进行 `iterations` 次膨胀. 范围外视为背景.
pub fn dilate(mask: &Array3<bool>, iterations: usize) -> Array3<bool> {
    let shape = mask.dim();
    let mut cur = mask.clone();
    for _ in 0..iterations {
        let mut next = cur.clone();
        for (pos, _) in cur.indexed_iter().filter(|(_, b)| **b) {
            for neigh in diamond_neighbours(pos, shape) {
                next[neigh] = true;
            }
        }
        cur = next;
    }
    cur
}

/// 计算每个体素到 `target` 中最近的 `true` 体素的欧氏距离 (单位间距).
/// `target` 内部的体素距离为 0.
///
/// 若 `target` 全为 `false`, 则返回 `None`.
pub fn distance_to_mask(target: &Array3<bool>) -> Option<Volume> {
    if !target.iter().any(|&b| b) {
        return None;
    }
    let mut d = target.map(|&b| if b { 0.0 } else { f64::INFINITY });
    let longest = d.shape().iter().copied().max().unwrap_or(0);
    let mut f = vec![0.0; longest];
    let mut out = vec![0.0; longest];

    // 可分离的平方距离变换, 依次沿三个轴进行.
    for axis in 0..3 {
        for mut lane in d.lanes_mut(Axis(axis)) {
            let n = lane.len();
            f[..n].iter_mut().zip(lane.iter()).for_each(|(w, r)| *w = *r);
            squared_distance_1d(&f[..n], &mut out[..n]);
            lane.iter_mut().zip(out[..n].iter()).for_each(|(w, r)| *w = *r);
        }
    }
    d.mapv_inplace(f64::sqrt);
    Some(d)
}

/// 一维平方距离变换 (抛物线下包络). `f` 中的无穷值不作为抛物线顶点.
fn squared_distance_1d(f: &[f64], out: &mut [f64]) {
    // `v[i]` 是第 i 条抛物线的顶点, `z[i]` 是它在下包络中的左边界.
    let mut v: Vec<usize> = Vec::with_capacity(f.len());
    let mut z: Vec<f64> = Vec::with_capacity(f.len());
    let sq = |q: usize| (q * q) as f64;

    for (q, &fq) in f.iter().enumerate().filter(|(_, x)| x.is_finite()) {
        loop {
            let Some(&p) = v.last() else {
                v.push(q);
                z.push(f64::NEG_INFINITY);
                break;
            };
            let s = ((fq + sq(q)) - (f[p] + sq(p))) / (2.0 * (q - p) as f64);
            if s <= z[z.len() - 1] {
                v.pop();
                z.pop();
            } else {
                v.push(q);
                z.push(s);
                break;
            }
        }
    }

    if v.is_empty() {
        out.fill(f64::INFINITY);
        return;
    }
    let mut k = 0;
    for (q, o) in out.iter_mut().enumerate() {
        let qf = q as f64;
        while k + 1 < v.len() && z[k + 1] < qf {
            k += 1;
        }
        let p = v[k];
        *o = (qf - p as f64).powi(2) + f[p];
    }
}
