/// Persistence metadata carried by every object.
///
/// Objects built in application code start out new; objects materialized
/// from a scan are marked as already persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Meta {
    pub is_new: bool,
}

impl Default for Meta {
    fn default() -> Self {
        Self { is_new: true }
    }
}

impl Meta {
    pub fn persisted() -> Self {
        Self { is_new: false }
    }
}

impl Meta {
    pub fn is_new(&self) -> bool {
        self.is_new
    }
}
