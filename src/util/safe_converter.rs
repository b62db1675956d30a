
/// For widening casts that can never lose information on supported platforms
pub trait SafeCast<T> {
    fn safe_cast(self) -> T;
}

#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
impl SafeCast<u64> for usize {
    fn safe_cast(self) -> u64 {
        self as u64
    }
}

impl SafeCast<u64> for u16 {
    fn safe_cast(self) -> u64 {
        self.into()
    }
}


/// For narrowing casts where business logic ensures that the value is in the narrower type's range.
/// NB: The implementations will panic otherwise
pub trait PrecheckedCast<T> {
    fn prechecked_cast(self) -> T;
}
impl PrecheckedCast<usize> for u64 {
    fn prechecked_cast(self) -> usize {
        self.try_into().expect("this is a bug: application logic should have ensured the value range")
    }
}


/// For narrowing casts that clamp to the narrower type's maximum, e.g. advertising a receive
///  window bigger than a header field can hold
pub trait SaturatingCast<T> {
    fn saturating_cast(self) -> T;
}
impl SaturatingCast<u16> for usize {
    fn saturating_cast(self) -> u16 {
        self.try_into().unwrap_or(u16::MAX)
    }
}
impl SaturatingCast<usize> for u64 {
    fn saturating_cast(self) -> usize {
        self.try_into().unwrap_or(usize::MAX)
    }
}
