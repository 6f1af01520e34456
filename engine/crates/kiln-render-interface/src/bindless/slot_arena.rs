struct BindlessSlot<T> {
    value: Option<T>,
    /// 每次释放后递增
    generation: u32,
}

/// 固定容量的 slot 数组 + 空闲栈
///
/// 释放的 slot 压入空闲栈，分配时优先弹出最近释放的 slot（LIFO），
/// 空闲栈为空时再找第一个未使用过的 slot。已分配的 slot 永不移动。
pub(crate) struct BindlessSlotArena<T> {
    slots: Vec<BindlessSlot<T>>,
    free_slots: Vec<u32>,
    capacity: u32,
    live_count: u32,
}

impl<T> BindlessSlotArena<T> {
    pub(crate) fn new(capacity: u32) -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            capacity,
            live_count: 0,
        }
    }

    /// 返回 `(index, generation)`，没有空间时返回 None
    pub(crate) fn allocate(&mut self, value: T) -> Option<(u32, u32)> {
        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => self.first_unused()?,
        };

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.value.is_none());
        slot.value = Some(value);
        self.live_count += 1;
        Some((index, slot.generation))
    }

    fn first_unused(&mut self) -> Option<u32> {
        if let Some(index) = self.slots.iter().position(|slot| slot.value.is_none()) {
            return Some(index as u32);
        }
        if (self.slots.len() as u32) < self.capacity {
            self.slots.push(BindlessSlot {
                value: None,
                generation: 0,
            });
            return Some(self.slots.len() as u32 - 1);
        }
        None
    }

    /// 句柄过期或 slot 空闲时返回 None，不会重复压栈
    pub(crate) fn free(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(index);
        self.live_count -= 1;
        Some(value)
    }

    pub(crate) fn get(&self, index: u32, generation: u32) -> Option<&T> {
        self.slots
            .get(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// 按 index 遍历全部容量，未使用的 slot 为 None
    pub(crate) fn iter_all(&self) -> impl Iterator<Item = Option<&T>> + '_ {
        (0..self.capacity as usize).map(|index| self.slots.get(index).and_then(|slot| slot.value.as_ref()))
    }

    /// 清空所有 slot，之前的句柄全部失效
    pub(crate) fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.free_slots.clear();
        self.live_count = 0;
    }

    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub(crate) fn live_count(&self) -> u32 {
        self.live_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifo_reuse_before_fresh_slot() {
        let mut arena = BindlessSlotArena::new(8);
        let a = arena.allocate('a').unwrap();
        let b = arena.allocate('b').unwrap();
        let c = arena.allocate('c').unwrap();
        assert_eq!((a.0, b.0, c.0), (0, 1, 2));

        arena.free(b.0, b.1).unwrap();
        arena.free(a.0, a.1).unwrap();

        // 最近释放的是 0
        assert_eq!(arena.allocate('d').unwrap().0, 0);
        assert_eq!(arena.allocate('e').unwrap().0, 1);
        assert_eq!(arena.allocate('f').unwrap().0, 3);
        assert_eq!(arena.live_count(), 4);
    }

    #[test]
    fn test_free_rejects_stale_generation() {
        let mut arena = BindlessSlotArena::new(2);
        let a = arena.allocate(1).unwrap();
        assert_eq!(arena.free(a.0, a.1), Some(1));
        assert_eq!(arena.free(a.0, a.1), None);

        let b = arena.allocate(2).unwrap();
        assert_eq!(b.0, a.0);
        assert_ne!(b.1, a.1);
        assert_eq!(arena.free(a.0, a.1), None);
        assert_eq!(arena.get(b.0, b.1), Some(&2));
    }

    #[test]
    fn test_capacity_exhaustion() {
        let mut arena = BindlessSlotArena::new(2);
        assert!(arena.allocate(0).is_some());
        assert!(arena.allocate(1).is_some());
        assert!(arena.allocate(2).is_none());
        assert_eq!(arena.live_count(), 2);
    }

    #[test]
    fn test_clear_restarts_from_first_slot() {
        let mut arena = BindlessSlotArena::new(4);
        let a = arena.allocate(0).unwrap();
        arena.allocate(1).unwrap();
        arena.clear();
        assert_eq!(arena.live_count(), 0);
        assert_eq!(arena.get(a.0, a.1), None);
        assert_eq!(arena.allocate(5).unwrap().0, 0);
        assert_eq!(arena.iter_all().filter(Option::is_some).count(), 1);
        assert_eq!(arena.iter_all().count(), 4);
    }
}
