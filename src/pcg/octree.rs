//! Octree over point bounds for overlap queries.
//!
//! Each point's box is stored in the deepest node whose cell fully contains it;
//! boxes straddling a split plane stay at the parent. Nodes keep the union of
//! their subtree's boxes so queries can reject whole branches. Node and element
//! arrays are flat, children of a node are 8 contiguous entries.

use crate::math::Aabb;
use super::point::PcgPoint;

/// Leaves split once they hold more than this many elements.
pub const MAX_ELEMENTS_PER_LEAF: usize = 16;

/// Default maximum subdivision depth.
pub const DEFAULT_MAX_DEPTH: u8 = 12;

const NO_CHILDREN: u32 = u32::MAX;

/// Range query over point boxes.
///
/// Implementations must be read-only during a query and index the same point
/// set the caller iterates.
pub trait SpatialIndex {
    /// Number of points the index was built over.
    fn element_count(&self) -> usize;

    /// Call `visit` with the index of every point whose box intersects `bounds`.
    /// No ordering guarantee among matches.
    fn find_elements_with_bounds_test(&self, bounds: &Aabb, visit: &mut dyn FnMut(usize));
}

#[derive(Clone, Debug)]
pub struct OctreeNode {
    /// Cell covered by this node
    pub bounds: Aabb,
    /// Union of all element boxes in this subtree
    pub content_bounds: Aabb,
    /// Index of the first of 8 children, or `u32::MAX` for a leaf
    pub first_child: u32,
    /// Range of this node's own elements in the element array
    pub first_element: u32,
    pub element_count: u32,
}

impl OctreeNode {
    fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            content_bounds: Aabb::EMPTY,
            first_child: NO_CHILDREN,
            first_element: 0,
            element_count: 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.first_child == NO_CHILDREN
    }
}

/// Octree built once over a point set.
pub struct PointOctree {
    nodes: Vec<OctreeNode>,
    elements: Vec<u32>,
    element_bounds: Vec<Aabb>,
    max_depth: u8,
}

impl PointOctree {
    /// Build from points with the default depth limit.
    pub fn build(points: &[PcgPoint]) -> Self {
        Self::build_with_depth(points, DEFAULT_MAX_DEPTH)
    }

    pub fn build_with_depth(points: &[PcgPoint], max_depth: u8) -> Self {
        let element_bounds: Vec<Aabb> = points.iter().map(PcgPoint::bounds).collect();
        Self::from_bounds(element_bounds, max_depth)
    }

    /// Build from raw boxes; element `i` is `bounds[i]`.
    pub fn from_bounds(element_bounds: Vec<Aabb>, max_depth: u8) -> Self {
        let mut octree = Self {
            nodes: Vec::new(),
            elements: Vec::with_capacity(element_bounds.len()),
            element_bounds,
            max_depth,
        };

        if octree.element_bounds.is_empty() {
            return octree;
        }

        let root_bounds = octree
            .element_bounds
            .iter()
            .fold(Aabb::EMPTY, |acc, b| acc.merged(b))
            .to_cube();
        octree.nodes.push(OctreeNode::new(root_bounds));

        let items: Vec<u32> = (0..octree.element_bounds.len() as u32).collect();
        octree.build_node(0, items, 0);

        log::trace!(
            "Built point octree: {} elements, {} nodes",
            octree.element_bounds.len(),
            octree.nodes.len()
        );
        octree
    }

    fn build_node(&mut self, node_idx: usize, items: Vec<u32>, depth: u8) {
        let cell = self.nodes[node_idx].bounds;

        if items.len() <= MAX_ELEMENTS_PER_LEAF || depth >= self.max_depth {
            self.store_elements(node_idx, &items);
            return;
        }

        let mut buckets: [Vec<u32>; 8] = Default::default();
        let mut here = Vec::new();
        for &item in &items {
            match cell.octant_containing(&self.element_bounds[item as usize]) {
                Some(octant) => buckets[octant as usize].push(item),
                None => here.push(item),
            }
        }

        // Nothing fits a child, splitting would only add empty nodes
        if here.len() == items.len() {
            self.store_elements(node_idx, &items);
            return;
        }

        self.store_elements(node_idx, &here);

        let first_child = self.nodes.len();
        for octant in 0..8u8 {
            self.nodes.push(OctreeNode::new(cell.child_octant(octant)));
        }
        self.nodes[node_idx].first_child = first_child as u32;

        let mut content = self.nodes[node_idx].content_bounds;
        for (octant, bucket) in buckets.into_iter().enumerate() {
            let child_idx = first_child + octant;
            if !bucket.is_empty() {
                self.build_node(child_idx, bucket, depth + 1);
            }
            content = content.merged(&self.nodes[child_idx].content_bounds);
        }
        self.nodes[node_idx].content_bounds = content;
    }

    fn store_elements(&mut self, node_idx: usize, items: &[u32]) {
        let content = items
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| acc.merged(&self.element_bounds[i as usize]));
        let node = &mut self.nodes[node_idx];
        node.first_element = self.elements.len() as u32;
        node.element_count = items.len() as u32;
        node.content_bounds = content;
        self.elements.extend_from_slice(items);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    /// Root cell, if any elements were indexed.
    pub fn root_bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| n.bounds)
    }

    /// Box of element `index`.
    pub fn element_bounds(&self, index: usize) -> Option<&Aabb> {
        self.element_bounds.get(index)
    }
}

impl SpatialIndex for PointOctree {
    fn element_count(&self) -> usize {
        self.element_bounds.len()
    }

    fn find_elements_with_bounds_test(&self, bounds: &Aabb, visit: &mut dyn FnMut(usize)) {
        if self.nodes.is_empty() {
            return;
        }

        let mut stack = vec![0u32];
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx as usize];
            if !node.content_bounds.intersects(bounds) {
                continue;
            }

            let start = node.first_element as usize;
            let end = start + node.element_count as usize;
            for &element in &self.elements[start..end] {
                if self.element_bounds[element as usize].intersects(bounds) {
                    visit(element as usize);
                }
            }

            if !node.is_leaf() {
                stack.extend(node.first_child..node.first_child + 8);
            }
        }
    }
}

/// Linear scan over point boxes. Useful for tiny sets and as a reference.
pub struct LinearIndex {
    bounds: Vec<Aabb>,
}

impl LinearIndex {
    pub fn new(points: &[PcgPoint]) -> Self {
        Self {
            bounds: points.iter().map(PcgPoint::bounds).collect(),
        }
    }
}

impl SpatialIndex for LinearIndex {
    fn element_count(&self) -> usize {
        self.bounds.len()
    }

    fn find_elements_with_bounds_test(&self, bounds: &Aabb, visit: &mut dyn FnMut(usize)) {
        for (i, b) in self.bounds.iter().enumerate() {
            if b.intersects(bounds) {
                visit(i);
            }
        }
    }
}
