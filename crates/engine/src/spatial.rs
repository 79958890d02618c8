use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Items a node holds before it splits.
    pub max_objects: usize,
    /// Deepest level that may still split.
    pub max_levels: u32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            max_objects: 10,
            max_levels: 5,
        }
    }
}

/// Region quad-tree rebuilt from scratch every frame.
///
/// Items that do not fit entirely inside one quadrant stay in the node above
/// it, and items outside the covered region stay in the root, so a query
/// never misses an item whose box it overlaps. Results may include items
/// that do not overlap the query.
#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    config: SpatialConfig,
    root: Node<T>,
}

#[derive(Debug, Clone)]
struct Node<T> {
    level: u32,
    bounds: Rect,
    items: Vec<(T, Rect)>,
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T: Copy> Default for QuadTree<T> {
    fn default() -> Self {
        Self::new(SpatialConfig::default())
    }
}

impl<T: Copy> QuadTree<T> {
    pub fn new(config: SpatialConfig) -> Self {
        Self {
            config,
            root: Node::new(0, Rect::default()),
        }
    }

    /// Redefines the covered region, dropping every indexed item.
    pub fn set_bounds(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.root = Node::new(0, Rect::new(x, y, width, height));
    }

    pub fn bounds(&self) -> Rect {
        self.root.bounds
    }

    pub fn clear(&mut self) {
        let bounds = self.root.bounds;
        self.root = Node::new(0, bounds);
    }

    pub fn insert(&mut self, item: T, rect: Rect) {
        self.root.insert(item, rect, &self.config);
    }

    pub fn insert_all(&mut self, items: impl IntoIterator<Item = (T, Rect)>) {
        for (item, rect) in items {
            self.insert(item, rect);
        }
    }

    pub fn retrieve(&self, query: &Rect) -> Vec<T> {
        let mut out = Vec::new();
        self.root.retrieve(query, &mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels currently in use, 1 for an unsplit root.
    pub fn depth(&self) -> u32 {
        self.root.depth()
    }
}

impl<T: Copy> Node<T> {
    fn new(level: u32, bounds: Rect) -> Self {
        Self {
            level,
            bounds,
            items: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, item: T, rect: Rect, config: &SpatialConfig) {
        if let Some(children) = self.children.as_mut() {
            if let Some(child) = children.iter_mut().find(|c| c.bounds.contains_rect(&rect)) {
                child.insert(item, rect, config);
                return;
            }
        }

        self.items.push((item, rect));
        if self.items.len() <= config.max_objects || self.level >= config.max_levels {
            return;
        }
        // Halving a one pixel edge would leave a quadrant with no area.
        if self.bounds.width < 2 || self.bounds.height < 2 {
            return;
        }
        if self.children.is_none() {
            self.split();
        }
        let Some(children) = self.children.as_mut() else {
            return;
        };
        let pending = std::mem::take(&mut self.items);
        for (item, rect) in pending {
            match children.iter_mut().find(|c| c.bounds.contains_rect(&rect)) {
                Some(child) => child.insert(item, rect, config),
                None => self.items.push((item, rect)),
            }
        }
    }

    fn split(&mut self) {
        let Rect {
            x,
            y,
            width,
            height,
        } = self.bounds;
        let left_w = width / 2;
        let top_h = height / 2;
        let right_w = width - left_w;
        let bottom_h = height - top_h;
        let level = self.level + 1;
        self.children = Some(Box::new([
            Node::new(level, Rect::new(x.saturating_add(left_w), y, right_w, top_h)),
            Node::new(level, Rect::new(x, y, left_w, top_h)),
            Node::new(level, Rect::new(x, y.saturating_add(top_h), left_w, bottom_h)),
            Node::new(
                level,
                Rect::new(x.saturating_add(left_w), y.saturating_add(top_h), right_w, bottom_h),
            ),
        ]));
    }

    fn retrieve(&self, query: &Rect, out: &mut Vec<T>) {
        out.extend(self.items.iter().map(|(item, _)| *item));
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                if child.bounds.intersects(query) {
                    child.retrieve(query, out);
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.items.len()
            + self
                .children
                .as_ref()
                .map_or(0, |children| children.iter().map(Node::len).sum())
    }

    fn depth(&self) -> u32 {
        1 + self
            .children
            .as_ref()
            .map_or(0, |children| children.iter().map(Node::depth).max().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_items(count: i32, size: i32, spacing: i32) -> Vec<(usize, Rect)> {
        let mut items = Vec::new();
        for row in 0..count {
            for col in 0..count {
                let index = (row * count + col) as usize;
                items.push((index, Rect::new(col * spacing, row * spacing, size, size)));
            }
        }
        items
    }

    #[test]
    fn retrieve_before_any_setup_is_empty() {
        let tree: QuadTree<usize> = QuadTree::default();
        assert!(tree.retrieve(&Rect::new(0, 0, 100, 100)).is_empty());
        assert!(tree.is_empty());
    }

    #[test]
    fn clear_drops_items_but_keeps_bounds() {
        let mut tree = QuadTree::default();
        tree.set_bounds(0, 0, 640, 480);
        tree.insert_all(grid_items(8, 10, 40));
        assert_eq!(tree.len(), 64);
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.bounds(), Rect::new(0, 0, 640, 480));
        assert!(tree.retrieve(&Rect::new(0, 0, 640, 480)).is_empty());
    }

    #[test]
    fn tree_subdivides_past_threshold() {
        let mut tree = QuadTree::new(SpatialConfig {
            max_objects: 4,
            max_levels: 5,
        });
        tree.set_bounds(0, 0, 320, 320);
        tree.insert_all(grid_items(8, 10, 40));
        assert!(tree.depth() > 1);
        assert_eq!(tree.len(), 64);
    }

    #[test]
    fn retrieve_has_no_false_negatives() {
        let mut tree = QuadTree::new(SpatialConfig {
            max_objects: 2,
            max_levels: 6,
        });
        tree.set_bounds(0, 0, 320, 320);
        let mut items = grid_items(10, 12, 32);
        // Straddles the centre lines and sits partly outside the region.
        items.push((1000, Rect::new(150, 150, 20, 20)));
        items.push((1001, Rect::new(310, -20, 40, 40)));
        items.push((1002, Rect::new(500, 500, 10, 10)));
        tree.insert_all(items.iter().copied());

        let queries = [
            Rect::new(0, 0, 1, 1),
            Rect::new(155, 155, 2, 2),
            Rect::new(100, 100, 90, 90),
            Rect::new(300, 0, 50, 10),
            Rect::new(505, 505, 1, 1),
            Rect::new(-50, -50, 500, 500),
        ];
        for query in queries {
            let found = tree.retrieve(&query);
            for (item, rect) in &items {
                if rect.intersects(&query) {
                    assert!(
                        found.contains(item),
                        "item {item} at {rect:?} missing for query {query:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn retrieve_prunes_distant_quadrants() {
        let mut tree = QuadTree::new(SpatialConfig {
            max_objects: 1,
            max_levels: 4,
        });
        tree.set_bounds(0, 0, 400, 400);
        tree.insert_all(grid_items(4, 10, 100));
        let found = tree.retrieve(&Rect::new(0, 0, 5, 5));
        assert!(found.contains(&0));
        assert!(found.len() < 16);
    }

    #[test]
    fn max_levels_caps_subdivision() {
        let mut tree = QuadTree::new(SpatialConfig {
            max_objects: 1,
            max_levels: 2,
        });
        tree.set_bounds(0, 0, 64, 64);
        for index in 0..20 {
            tree.insert(index, Rect::new(1, 1, 1, 1));
        }
        assert!(tree.depth() <= 3);
        assert_eq!(tree.retrieve(&Rect::new(1, 1, 1, 1)).len(), 20);
    }

    #[test]
    fn single_pixel_region_keeps_zero_sized_items_retrievable() {
        let mut tree = QuadTree::new(SpatialConfig {
            max_objects: 1,
            max_levels: 8,
        });
        tree.set_bounds(0, 0, 1, 1);
        for index in 0..3 {
            tree.insert(index, Rect::new(0, 0, 0, 0));
        }
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.retrieve(&Rect::new(0, 0, 1, 1)).len(), 3);
    }

    #[test]
    fn thin_region_does_not_split_into_empty_quadrants() {
        let mut tree = QuadTree::new(SpatialConfig {
            max_objects: 1,
            max_levels: 8,
        });
        tree.set_bounds(0, 0, 1, 64);
        for index in 0..4 {
            tree.insert(index, Rect::new(0, index * 10, 1, 1));
        }
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.retrieve(&Rect::new(0, 30, 1, 1)).len(), 4);
    }
}
