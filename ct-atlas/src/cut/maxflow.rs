use std::collections::VecDeque;

/// 两端点 (source / sink) 的有向流网络. 使用 Dinic 算法求最大流,
/// 之后可查询最小割中每个节点所在的一侧.
///
/// 节点 `0..n` 为普通节点, `n` 为 source, `n + 1` 为 sink.
/// 边以成对方式存储: 第 `e` 条边的反向边是 `e ^ 1`.
pub(crate) struct FlowNetwork {
    n: usize,
    adj: Vec<Vec<usize>>,
    to: Vec<usize>,
    cap: Vec<i64>,
    level: Vec<i32>,
    cursor: Vec<usize>,
}

impl FlowNetwork {
    /// 创建含 `n` 个普通节点的空网络.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            adj: vec![Vec::new(); n + 2],
            to: Vec::new(),
            cap: Vec::new(),
            level: vec![-1; n + 2],
            cursor: vec![0; n + 2],
        }
    }

    #[inline]
    fn source(&self) -> usize {
        self.n
    }

    #[inline]
    fn sink(&self) -> usize {
        self.n + 1
    }

    /// 添加容量为 `cap` 的有向边 `from -> to`. 容量为零时忽略.
    pub fn add_edge(&mut self, from: usize, to: usize, cap: i64) {
        debug_assert!(cap >= 0);
        if cap == 0 {
            return;
        }
        self.adj[from].push(self.to.len());
        self.to.push(to);
        self.cap.push(cap);
        self.adj[to].push(self.to.len());
        self.to.push(from);
        self.cap.push(0);
    }

    /// 为节点 `p` 添加 t-link: 节点位于 sink 一侧时付出 `cost_sink_side`,
    /// 位于 source 一侧时付出 `cost_source_side`. 只保留差值, 公共部分由调用方计入常数.
    pub fn add_tweights(&mut self, p: usize, cost_source_side: i64, cost_sink_side: i64) {
        let (s, t) = (self.source(), self.sink());
        if cost_sink_side > cost_source_side {
            self.add_edge(s, p, cost_sink_side - cost_source_side);
        } else {
            self.add_edge(p, t, cost_source_side - cost_sink_side);
        }
    }

    /// 计算最大流.
    pub fn max_flow(&mut self) -> i64 {
        let mut flow = 0;
        while self.bfs_levels() {
            self.cursor.iter_mut().for_each(|c| *c = 0);
            flow += self.blocking_flow();
        }
        flow
    }

    /// 在残量网络上分层. 返回 sink 是否可达.
    fn bfs_levels(&mut self) -> bool {
        self.level.iter_mut().for_each(|l| *l = -1);
        let s = self.source();
        self.level[s] = 0;
        let mut q = VecDeque::with_capacity(self.n + 2);
        q.push_back(s);
        while let Some(v) = q.pop_front() {
            for &e in self.adj[v].iter() {
                let u = self.to[e];
                if self.cap[e] > 0 && self.level[u] < 0 {
                    self.level[u] = self.level[v] + 1;
                    q.push_back(u);
                }
            }
        }
        self.level[self.sink()] >= 0
    }

    /// 非递归地寻找阻塞流. 大图上的增广路可能很长, 递归会耗尽栈空间.
    fn blocking_flow(&mut self) -> i64 {
        let (s, t) = (self.source(), self.sink());
        let mut total = 0;
        let mut path: Vec<usize> = Vec::with_capacity(64);
        let mut v = s;
        loop {
            if v == t {
                let f = path.iter().map(|&e| self.cap[e]).min().unwrap_or(0);
                for &e in path.iter() {
                    self.cap[e] -= f;
                    self.cap[e ^ 1] += f;
                }
                total += f;
                path.clear();
                v = s;
                continue;
            }

            // 沿当前弧前进
            let mut advanced = false;
            while self.cursor[v] < self.adj[v].len() {
                let e = self.adj[v][self.cursor[v]];
                let u = self.to[e];
                if self.cap[e] > 0 && self.level[u] == self.level[v] + 1 {
                    path.push(e);
                    v = u;
                    advanced = true;
                    break;
                }
                self.cursor[v] += 1;
            }
            if advanced {
                continue;
            }

            // 死路: 回退
            if v == s {
                break total;
            }
            self.level[v] = -1;
            let Some(e) = path.pop() else {
                unreachable!()
            };
            v = self.to[e ^ 1];
            self.cursor[v] += 1;
        }
    }

    /// 最大流之后, 返回每个普通节点是否位于 sink 一侧.
    pub fn sink_side(&self) -> Vec<bool> {
        let s = self.source();
        let mut reach = vec![false; self.n + 2];
        reach[s] = true;
        let mut q = VecDeque::from([s]);
        while let Some(v) = q.pop_front() {
            for &e in self.adj[v].iter() {
                let u = self.to[e];
                if self.cap[e] > 0 && !reach[u] {
                    reach[u] = true;
                    q.push_back(u);
                }
            }
        }
        reach[..self.n].iter().map(|r| !r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::FlowNetwork;

    #[test]
    fn test_max_flow_classic() {
        // s -> 0 (10), s -> 1 (10), 0 -> 1 (2), 0 -> 2 (4), 0 -> 3 (8),
        // 1 -> 3 (9), 3 -> 2 (6), 2 -> t (10), 3 -> t (10)
        let mut g = FlowNetwork::new(4);
        let (s, t) = (4, 5);
        g.add_edge(s, 0, 10);
        g.add_edge(s, 1, 10);
        g.add_edge(0, 1, 2);
        g.add_edge(0, 2, 4);
        g.add_edge(0, 3, 8);
        g.add_edge(1, 3, 9);
        g.add_edge(3, 2, 6);
        g.add_edge(2, t, 10);
        g.add_edge(3, t, 10);
        assert_eq!(g.max_flow(), 19);
    }

    #[test]
    fn test_min_cut_sides() {
        // p 倾向 sink 一侧, q 倾向 source 一侧, 两者之间的边很弱.
        let mut g = FlowNetwork::new(2);
        g.add_tweights(0, 10, 1);
        g.add_tweights(1, 1, 10);
        g.add_edge(0, 1, 2);
        g.add_edge(1, 0, 2);
        assert_eq!(g.max_flow(), 2);
        assert_eq!(g.sink_side(), vec![true, false]);
    }

    #[test]
    fn test_long_chain() {
        // 长链不会导致栈溢出.
        let n = 200_000;
        let mut g = FlowNetwork::new(n);
        g.add_edge(n, 0, 5);
        for i in 0..n - 1 {
            g.add_edge(i, i + 1, 7);
        }
        g.add_edge(n - 1, n + 1, 3);
        assert_eq!(g.max_flow(), 3);
    }
}
