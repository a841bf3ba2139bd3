//! α-扩展与 α-β 交换移动.
//!
//! 每次移动都是一个二值问题: `x_p = 0` 保持原状, `x_p = 1` 接受移动.
//! 二值成对项 `E(0,0) = A, E(0,1) = B, E(1,0) = C, E(1,1) = D` 分解为
//! `A + (C - A) x_p + (D - C) x_q + (B + C - A - D) (1 - x_p) x_q`,
//! 子模性 (`B + C >= A + D`) 由度量/半度量条件保证.

use super::labeling_energy;
use super::maxflow::FlowNetwork;
use crate::graph::Edge;
use ndarray::ArrayView2;

/// 二值移动能量的累加器.
struct BinaryEnergy {
    /// 每个节点取 0 / 1 的代价.
    unary: Vec<[i64; 2]>,
    /// 成对项 `(p, q, B + C - A - D)`.
    pairs: Vec<(usize, usize, i64)>,
}

impl BinaryEnergy {
    fn new(n: usize) -> Self {
        Self {
            unary: vec![[0; 2]; n],
            pairs: Vec::new(),
        }
    }

    #[inline]
    fn add_unary(&mut self, p: usize, e0: i64, e1: i64) {
        self.unary[p][0] += e0;
        self.unary[p][1] += e1;
    }

    /// 添加二值成对项. 常数 `A` 与最终标签无关, 直接丢弃.
    fn add_pair(&mut self, p: usize, q: usize, [a, b, c, d]: [i64; 4]) {
        debug_assert!(b + c >= a + d);
        self.unary[p][1] += c - a;
        self.unary[q][1] += d - c;
        let w = b + c - a - d;
        if w > 0 {
            self.pairs.push((p, q, w));
        }
    }

    /// 求最小割. 返回每个节点是否取 1 (位于 sink 一侧).
    fn minimize(self) -> Vec<bool> {
        let mut g = FlowNetwork::new(self.unary.len());
        for (p, [e0, e1]) in self.unary.into_iter().enumerate() {
            g.add_tweights(p, e0, e1);
        }
        for (p, q, w) in self.pairs {
            // p 位于 source 一侧 (0), q 位于 sink 一侧 (1) 时被割断.
            g.add_edge(p, q, w);
        }
        g.max_flow();
        g.sink_side()
    }
}

/// 执行一轮 α-扩展 (遍历所有标签). 只接受使能量严格下降的移动. 返回新的能量.
pub(super) fn expansion_round(
    edges: &[Edge],
    unary: ArrayView2<i32>,
    pairwise: ArrayView2<i32>,
    labels: &mut [u8],
    mut energy: i64,
) -> i64 {
    let v = |a: u8, b: u8| pairwise[(a as usize, b as usize)] as i64;
    for alpha in 0..unary.ncols() as u8 {
        let mut be = BinaryEnergy::new(labels.len());
        for (p, &f) in labels.iter().enumerate() {
            be.add_unary(
                p,
                unary[(p, f as usize)] as i64,
                unary[(p, alpha as usize)] as i64,
            );
        }
        for e in edges {
            let (p, q, w) = (e.a as usize, e.b as usize, e.weight as i64);
            let (fp, fq) = (labels[p], labels[q]);
            be.add_pair(
                p,
                q,
                [
                    w * v(fp, fq),
                    w * v(fp, alpha),
                    w * v(alpha, fq),
                    w * v(alpha, alpha),
                ],
            );
        }

        let accept = be.minimize();
        let proposal: Vec<u8> = labels
            .iter()
            .zip(accept)
            .map(|(&f, x)| if x { alpha } else { f })
            .collect();
        let e = labeling_energy(edges, unary, pairwise, &proposal);
        if e < energy {
            labels.copy_from_slice(&proposal);
            energy = e;
        }
    }
    energy
}

/// 执行一轮 α-β 交换 (遍历所有标签对). 只接受使能量严格下降的移动. 返回新的能量.
pub(super) fn swap_round(
    edges: &[Edge],
    unary: ArrayView2<i32>,
    pairwise: ArrayView2<i32>,
    labels: &mut [u8],
    mut energy: i64,
) -> i64 {
    let v = |a: u8, b: u8| pairwise[(a as usize, b as usize)] as i64;
    let k = unary.ncols() as u8;
    for alpha in 0..k {
        for beta in alpha + 1..k {
            let active = |l: u8| l == alpha || l == beta;
            if !labels.iter().any(|&l| active(l)) {
                continue;
            }

            // x = 0 -> alpha, x = 1 -> beta. 非活动节点固定, 其影响折算进一元项.
            let mut be = BinaryEnergy::new(labels.len());
            for p in (0..labels.len()).filter(|&p| active(labels[p])) {
                be.add_unary(
                    p,
                    unary[(p, alpha as usize)] as i64,
                    unary[(p, beta as usize)] as i64,
                );
            }
            for e in edges {
                let (p, q, w) = (e.a as usize, e.b as usize, e.weight as i64);
                let (fp, fq) = (labels[p], labels[q]);
                match (active(fp), active(fq)) {
                    (true, true) => be.add_pair(
                        p,
                        q,
                        [
                            w * v(alpha, alpha),
                            w * v(alpha, beta),
                            w * v(beta, alpha),
                            w * v(beta, beta),
                        ],
                    ),
                    (true, false) => be.add_unary(p, w * v(alpha, fq), w * v(beta, fq)),
                    (false, true) => be.add_unary(q, w * v(fp, alpha), w * v(fp, beta)),
                    (false, false) => {}
                }
            }

            let accept = be.minimize();
            let proposal: Vec<u8> = labels
                .iter()
                .zip(accept)
                .map(|(&f, x)| match (active(f), x) {
                    (false, _) => f,
                    (true, false) => alpha,
                    (true, true) => beta,
                })
                .collect();
            let e = labeling_energy(edges, unary, pairwise, &proposal);
            if e < energy {
                labels.copy_from_slice(&proposal);
                energy = e;
            }
        }
    }
    energy
}
