//! 3270 field attribute model
//!
//! A formatted screen is divided into fields by field attribute bytes placed
//! in the buffer by the SF and SFE orders. The attribute byte occupies one
//! screen position and governs every position that follows it up to the next
//! attribute.

use crate::codes::{
    FA_INTENSITY, FA_INT_HIGH_SEL, FA_INT_NORM_SEL, FA_INT_ZERO_NSEL, FA_MODIFIED, FA_NUMERIC,
    FA_PROTECT,
};

/// Display intensity selected by the two-bit intensity/selectability code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldIntensity {
    /// Normal intensity, not light-pen selectable
    Normal,
    /// Normal intensity, selectable
    NormalSelectable,
    /// Intensified, selectable
    Intensified,
    /// Nondisplay: contents are held but never shown
    NonDisplay,
}

/// Field attribute byte
///
/// Newtype over the raw attribute byte as carried by the SF order and
/// reproduced by Read Buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAttribute(pub u8);

impl FieldAttribute {
    /// Attribute synthesised for an unformatted screen: unprotected,
    /// alphanumeric, normal intensity
    pub fn unformatted() -> Self {
        FieldAttribute(0)
    }

    pub fn is_protected(self) -> bool {
        self.0 & FA_PROTECT != 0
    }

    pub fn is_numeric(self) -> bool {
        self.0 & FA_NUMERIC != 0
    }

    /// Protected + numeric together mean the cursor skips over the field
    pub fn is_autoskip(self) -> bool {
        self.is_protected() && self.is_numeric()
    }

    pub fn intensity(self) -> FieldIntensity {
        match self.0 & FA_INTENSITY {
            FA_INT_NORM_SEL => FieldIntensity::NormalSelectable,
            FA_INT_HIGH_SEL => FieldIntensity::Intensified,
            FA_INT_ZERO_NSEL => FieldIntensity::NonDisplay,
            _ => FieldIntensity::Normal,
        }
    }

    pub fn is_nondisplay(self) -> bool {
        self.intensity() == FieldIntensity::NonDisplay
    }

    pub fn is_selectable(self) -> bool {
        matches!(
            self.intensity(),
            FieldIntensity::NormalSelectable | FieldIntensity::Intensified
        )
    }

    /// Modified Data Tag: set when the operator (or the host) changes the
    /// field, consumed by Read Modified
    pub fn is_modified(self) -> bool {
        self.0 & FA_MODIFIED != 0
    }

    pub fn with_mdt(self) -> Self {
        FieldAttribute(self.0 | FA_MODIFIED)
    }

    pub fn without_mdt(self) -> Self {
        FieldAttribute(self.0 & !FA_MODIFIED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protection_and_numeric() {
        let attr = FieldAttribute(FA_PROTECT | FA_NUMERIC);
        assert!(attr.is_protected());
        assert!(attr.is_numeric());
        assert!(attr.is_autoskip());
        assert!(!FieldAttribute(FA_PROTECT).is_autoskip());
    }

    #[test]
    fn test_intensity_decode() {
        assert_eq!(FieldAttribute(0x00).intensity(), FieldIntensity::Normal);
        assert_eq!(
            FieldAttribute(FA_INT_HIGH_SEL).intensity(),
            FieldIntensity::Intensified
        );
        assert!(FieldAttribute(FA_INT_ZERO_NSEL).is_nondisplay());
        assert!(FieldAttribute(FA_INT_NORM_SEL).is_selectable());
    }

    #[test]
    fn test_mdt_round_trip() {
        let attr = FieldAttribute(FA_PROTECT);
        let tagged = attr.with_mdt();
        assert!(tagged.is_modified());
        assert_eq!(tagged.without_mdt(), attr);
    }

    #[test]
    fn test_unformatted_is_open() {
        let attr = FieldAttribute::unformatted();
        assert!(!attr.is_protected());
        assert!(!attr.is_nondisplay());
        assert!(!attr.is_modified());
    }
}
