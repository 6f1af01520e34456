//! 依赖图构建和拓扑排序
//!
//! 根据每个 pass 的读写集合建立 生产者 -> 消费者 的有向边，
//! 然后按声明顺序打破平局做拓扑排序，保证同样的输入总是得到同样的结果。

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::frame_graph::handle::FgResourceHandle;

/// 依赖图
///
/// 节点存储 pass 的声明序号，边存储产生依赖的资源
pub struct FgDependencyGraph {
    graph: DiGraph<usize, Vec<FgResourceHandle>>,
    node_indices: Vec<NodeIndex>,
}

impl FgDependencyGraph {
    pub fn new(pass_count: usize) -> Self {
        let mut graph = DiGraph::with_capacity(pass_count, pass_count * 2);
        let node_indices = (0..pass_count).map(|i| graph.add_node(i)).collect();
        Self { graph, node_indices }
    }

    /// 分析资源依赖，构建依赖图
    ///
    /// 对于 pass 读取的每个资源，所有其他写入该资源的 pass 都是它的生产者
    pub fn analyze(reads: &[Vec<FgResourceHandle>], writes: &[Vec<FgResourceHandle>]) -> Self {
        let pass_count = reads.len().max(writes.len());
        let mut graph = Self::new(pass_count);

        for (consumer, consumer_reads) in reads.iter().enumerate() {
            for &handle in consumer_reads {
                for (producer, producer_writes) in writes.iter().enumerate() {
                    if producer != consumer && producer_writes.contains(&handle) {
                        graph.add_edge(producer, consumer, handle);
                    }
                }
            }
        }

        graph
    }

    /// 添加依赖边，同一对 pass 之间只保留一条边
    pub fn add_edge(&mut self, producer: usize, consumer: usize, handle: FgResourceHandle) {
        let producer_node = self.node_indices[producer];
        let consumer_node = self.node_indices[consumer];

        if let Some(edge_idx) = self.graph.find_edge(producer_node, consumer_node) {
            if let Some(handles) = self.graph.edge_weight_mut(edge_idx)
                && !handles.contains(&handle)
            {
                handles.push(handle);
            }
        } else {
            self.graph.add_edge(producer_node, consumer_node, vec![handle]);
        }
    }

    /// 执行拓扑排序
    ///
    /// 多个 pass 同时就绪时，先选择声明序号最小的
    ///
    /// # 返回
    /// - `Ok(order)`: 排序后的 pass 序号
    /// - `Err(cycle)`: 位于环上的 pass 序号，升序
    pub fn topological_sort(&self) -> Result<Vec<usize>, Vec<usize>> {
        let pass_count = self.node_indices.len();
        let mut in_degree: Vec<usize> = self
            .node_indices
            .iter()
            .map(|&node| self.graph.neighbors_directed(node, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> =
            in_degree.iter().enumerate().filter(|(_, degree)| **degree == 0).map(|(i, _)| Reverse(i)).collect();

        let mut order = Vec::with_capacity(pass_count);
        while let Some(Reverse(pass)) = ready.pop() {
            order.push(pass);
            for successor in self.graph.neighbors_directed(self.node_indices[pass], Direction::Outgoing) {
                let successor = self.graph[successor];
                in_degree[successor] -= 1;
                if in_degree[successor] == 0 {
                    ready.push(Reverse(successor));
                }
            }
        }

        if order.len() == pass_count {
            Ok(order)
        } else {
            Err(self.cycle_members())
        }
    }

    /// 所有位于环上的 pass
    fn cycle_members(&self) -> Vec<usize> {
        let mut members: Vec<usize> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .flatten()
            .map(|node| self.graph[node])
            .collect();
        members.sort_unstable();
        members
    }

    /// 获取 pass 的直接依赖（前驱），升序
    pub fn predecessors(&self, pass_index: usize) -> Vec<usize> {
        self.neighbors(pass_index, Direction::Incoming)
    }

    /// 获取 pass 的直接后继，升序
    pub fn successors(&self, pass_index: usize) -> Vec<usize> {
        self.neighbors(pass_index, Direction::Outgoing)
    }

    fn neighbors(&self, pass_index: usize, direction: Direction) -> Vec<usize> {
        let Some(&node) = self.node_indices.get(pass_index) else {
            return Vec::new();
        };
        let mut passes: Vec<usize> = self.graph.neighbors_directed(node, direction).map(|n| self.graph[n]).collect();
        passes.sort_unstable();
        passes
    }

    /// 产生 `producer -> consumer` 依赖的资源
    pub fn edge_resources(&self, producer: usize, consumer: usize) -> &[FgResourceHandle] {
        let (Some(&a), Some(&b)) = (self.node_indices.get(producer), self.node_indices.get(consumer)) else {
            return &[];
        };
        self.graph
            .find_edge(a, b)
            .and_then(|edge| self.graph.edge_weight(edge))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.node_indices.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    fn create_test_handles(count: usize) -> (SlotMap<FgResourceHandle, ()>, Vec<FgResourceHandle>) {
        let mut sm = SlotMap::with_key();
        let handles = (0..count).map(|_| sm.insert(())).collect();
        (sm, handles)
    }

    #[test]
    fn test_simple_dependency() {
        // Pass 0 写入 r0，Pass 1 读取 r0
        let (_sm, h) = create_test_handles(1);
        let reads = vec![vec![], vec![h[0]]];
        let writes = vec![vec![h[0]], vec![]];

        let graph = FgDependencyGraph::analyze(&reads, &writes);
        assert_eq!(graph.topological_sort(), Ok(vec![0, 1]));
        assert_eq!(graph.predecessors(1), vec![0]);
        assert_eq!(graph.successors(0), vec![1]);
        assert_eq!(graph.edge_resources(0, 1), &[h[0]]);
    }

    #[test]
    fn test_chain_declared_backwards() {
        // Pass 2 -> Pass 1 -> Pass 0
        let (_sm, h) = create_test_handles(2);
        let reads = vec![vec![h[1]], vec![h[0]], vec![]];
        let writes = vec![vec![], vec![h[1]], vec![h[0]]];

        let graph = FgDependencyGraph::analyze(&reads, &writes);
        assert_eq!(graph.topological_sort(), Ok(vec![2, 1, 0]));
    }

    #[test]
    fn test_independent_passes_keep_declaration_order() {
        // Pass 0、Pass 1 各自独立，Pass 2 读取两者
        let (_sm, h) = create_test_handles(2);
        let reads = vec![vec![], vec![], vec![h[0], h[1]], vec![]];
        let writes = vec![vec![h[0]], vec![h[1]], vec![], vec![]];

        let graph = FgDependencyGraph::analyze(&reads, &writes);
        assert_eq!(graph.topological_sort(), Ok(vec![0, 1, 2, 3]));
        assert_eq!(graph.predecessors(2), vec![0, 1]);
    }

    #[test]
    fn test_tie_break_prefers_lower_index() {
        // Pass 0 依赖 Pass 2；Pass 1 没有依赖，应该排在 Pass 0 之前
        let (_sm, h) = create_test_handles(1);
        let reads = vec![vec![h[0]], vec![], vec![]];
        let writes = vec![vec![], vec![], vec![h[0]]];

        let graph = FgDependencyGraph::analyze(&reads, &writes);
        assert_eq!(graph.topological_sort(), Ok(vec![1, 2, 0]));
    }

    #[test]
    fn test_multiple_resources_share_one_edge() {
        let (_sm, h) = create_test_handles(2);
        let reads = vec![vec![], vec![h[0], h[1]]];
        let writes = vec![vec![h[0], h[1]], vec![]];

        let graph = FgDependencyGraph::analyze(&reads, &writes);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge_resources(0, 1), &[h[0], h[1]]);
    }

    #[test]
    fn test_cycle_detection() {
        // Pass 1 <-> Pass 2 构成环，Pass 0 和 Pass 3 不在环上
        let (_sm, h) = create_test_handles(3);
        let reads = vec![vec![], vec![h[0], h[2]], vec![h[1]], vec![h[1]]];
        let writes = vec![vec![h[0]], vec![h[1]], vec![h[2]], vec![]];

        let graph = FgDependencyGraph::analyze(&reads, &writes);
        assert_eq!(graph.topological_sort(), Err(vec![1, 2]));
        // 同样的输入得到同样的结果
        assert_eq!(graph.topological_sort(), Err(vec![1, 2]));
    }

    #[test]
    fn test_read_modify_write_in_one_pass_is_not_a_cycle() {
        let (_sm, h) = create_test_handles(1);
        let reads = vec![vec![h[0]]];
        let writes = vec![vec![h[0]]];

        let graph = FgDependencyGraph::analyze(&reads, &writes);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.topological_sort(), Ok(vec![0]));
    }
}
