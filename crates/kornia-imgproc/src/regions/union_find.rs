/// A disjoint-set (union-find) forest over the pixels of an image.
///
/// Elements are created lazily: an element whose parent is `u32::MAX` is its own root.
pub struct UnionFind {
    parent: Vec<u32>,
    size: Vec<u32>,
}

impl UnionFind {
    /// Creates a new forest with `len` singleton sets.
    pub fn new(len: usize) -> Self {
        Self {
            parent: vec![u32::MAX; len],
            size: vec![1; len],
        }
    }

    /// Returns the representative (root) of the set containing `id`, with path compression.
    pub fn get_representative(&mut self, id: usize) -> usize {
        let mut root = id;
        while self.parent[root] != u32::MAX && self.parent[root] as usize != root {
            root = self.parent[root] as usize;
        }

        // collapse the path
        let mut node = id;
        while node != root {
            let next = self.parent[node] as usize;
            self.parent[node] = root as u32;
            node = next;
        }

        root
    }

    /// Unites the sets containing `aid` and `bid`, returning the representative of the resulting set.
    ///
    /// The larger set absorbs the smaller one.
    pub fn connect(&mut self, aid: usize, bid: usize) -> usize {
        let aroot = self.get_representative(aid);
        let broot = self.get_representative(bid);

        if aroot == broot {
            return aroot;
        }

        let (big, small) = if self.size[aroot] >= self.size[broot] {
            (aroot, broot)
        } else {
            (broot, aroot)
        };
        self.parent[small] = big as u32;
        self.size[big] += self.size[small];
        big
    }

    /// Number of elements in the set containing `id`.
    pub fn set_size(&mut self, id: usize) -> usize {
        let root = self.get_representative(id);
        self.size[root] as usize
    }

    /// Returns the number of elements in the forest.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Whether the forest holds no elements.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}
