use bitflags::bitflags;

bitflags! {
    /// Access and storage flags for classes, fields and methods.
    ///
    /// The bit values are written verbatim into class files.
    ///
    /// ```
    /// use classforge_core::Modifiers;
    ///
    /// let nested = Modifiers::PUBLIC | Modifiers::STATIC;
    /// assert!(nested.is_static());
    /// assert!(!nested.is_abstract());
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const ABSTRACT = 0x0400;
        /// Generated by the compiler, not declared in the tree.
        const SYNTHETIC = 0x1000;
    }
}

impl Modifiers {
    pub fn is_static(self) -> bool {
        self.contains(Modifiers::STATIC)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(Modifiers::ABSTRACT)
    }

    pub fn is_final(self) -> bool {
        self.contains(Modifiers::FINAL)
    }

    pub fn is_private(self) -> bool {
        self.contains(Modifiers::PRIVATE)
    }

    /// Whether more than one visibility flag is set.
    pub fn has_conflicting_visibility(self) -> bool {
        (self & (Modifiers::PUBLIC | Modifiers::PRIVATE | Modifiers::PROTECTED))
            .bits()
            .count_ones()
            > 1
    }
}
