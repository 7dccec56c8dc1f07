use bitflags::bitflags;

/// Opaque handle to an item registered with a [`crate::Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u32);

impl ItemId {
    pub const INVALID: ItemId = ItemId(u32::MAX);

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::INVALID
    }
}

bitflags! {
    /// Classification bits the traversal sorts and filters on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u32 {
        const TYPE_SHAPE = 1 << 0;
        const TYPE_META = 1 << 1;
        const TRANSPARENT = 1 << 2;
        const SHADOW_CASTER = 1 << 3;
        const SUB_META_CULLED = 1 << 4;
        const MIRROR = 1 << 5;
        const INVISIBLE = 1 << 6;
        const OUTLINE = 1 << 7;
    }
}

bitflags! {
    /// Views an item may appear in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ViewTags: u8 {
        const MAIN_VIEW = 1 << 0;
        const SECONDARY_VIEW = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemLayer {
    #[default]
    Scene3d,
    Front3d,
    Hud3d,
}

/// Immutable scene classification of an item. Built with [`ItemKeyBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemKey {
    flags: ItemFlags,
    tags: ViewTags,
    layer: ItemLayer,
}

impl ItemKey {
    pub fn builder() -> ItemKeyBuilder {
        ItemKeyBuilder::default()
    }

    pub fn flags(&self) -> ItemFlags {
        self.flags
    }

    pub fn tags(&self) -> ViewTags {
        self.tags
    }

    pub fn layer(&self) -> ItemLayer {
        self.layer
    }

    pub fn is_shape(&self) -> bool {
        self.flags.contains(ItemFlags::TYPE_SHAPE)
    }

    pub fn is_meta(&self) -> bool {
        self.flags.contains(ItemFlags::TYPE_META)
    }

    pub fn is_transparent(&self) -> bool {
        self.flags.contains(ItemFlags::TRANSPARENT)
    }

    pub fn is_opaque(&self) -> bool {
        !self.is_transparent()
    }

    pub fn is_shadow_caster(&self) -> bool {
        self.flags.contains(ItemFlags::SHADOW_CASTER)
    }

    pub fn is_sub_meta_culled(&self) -> bool {
        self.flags.contains(ItemFlags::SUB_META_CULLED)
    }

    pub fn is_mirror(&self) -> bool {
        self.flags.contains(ItemFlags::MIRROR)
    }

    pub fn is_visible(&self) -> bool {
        !self.flags.contains(ItemFlags::INVISIBLE)
    }

    pub fn has_outline(&self) -> bool {
        self.flags.contains(ItemFlags::OUTLINE)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ItemKeyBuilder {
    flags: ItemFlags,
    tags: ViewTags,
    layer: ItemLayer,
}

impl Default for ItemKeyBuilder {
    fn default() -> Self {
        Self {
            flags: ItemFlags::empty(),
            tags: ViewTags::all(),
            layer: ItemLayer::Scene3d,
        }
    }
}

impl ItemKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type_shape(mut self) -> Self {
        self.flags |= ItemFlags::TYPE_SHAPE;
        self
    }

    pub fn with_type_meta(mut self) -> Self {
        self.flags |= ItemFlags::TYPE_META;
        self
    }

    pub fn with_transparent(mut self) -> Self {
        self.flags |= ItemFlags::TRANSPARENT;
        self
    }

    pub fn with_shadow_caster(mut self) -> Self {
        self.flags |= ItemFlags::SHADOW_CASTER;
        self
    }

    pub fn with_sub_meta_culled(mut self) -> Self {
        self.flags |= ItemFlags::SUB_META_CULLED;
        self
    }

    pub fn with_mirror(mut self) -> Self {
        self.flags |= ItemFlags::MIRROR;
        self
    }

    pub fn with_invisible(mut self) -> Self {
        self.flags |= ItemFlags::INVISIBLE;
        self
    }

    pub fn with_outline(mut self) -> Self {
        self.flags |= ItemFlags::OUTLINE;
        self
    }

    /// Replace the view tags.
    pub fn with_tag_bits(mut self, tags: ViewTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_layer(mut self, layer: ItemLayer) -> Self {
        self.layer = layer;
        self
    }

    pub fn build(self) -> ItemKey {
        ItemKey {
            flags: self.flags,
            tags: self.tags,
            layer: self.layer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_id_is_default() {
        assert!(!ItemId::default().is_valid());
        assert!(ItemId::from_raw(0).is_valid());
    }

    #[test]
    fn builder_accumulates_flags() {
        let key = ItemKeyBuilder::new()
            .with_type_shape()
            .with_transparent()
            .with_mirror()
            .with_tag_bits(ViewTags::SECONDARY_VIEW)
            .with_layer(ItemLayer::Hud3d)
            .build();
        assert!(key.is_shape());
        assert!(!key.is_meta());
        assert!(key.is_transparent());
        assert!(key.is_mirror());
        assert!(key.is_visible());
        assert_eq!(key.tags(), ViewTags::SECONDARY_VIEW);
        assert_eq!(key.layer(), ItemLayer::Hud3d);
    }

    #[test]
    fn invisible_flag() {
        let key = ItemKey::builder().with_type_meta().with_invisible().build();
        assert!(!key.is_visible());
        assert!(key.is_opaque());
    }
}
