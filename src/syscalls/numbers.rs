//! System call numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SyscallNumber {
    Read = 0,
    Write = 1,
    Open = 2,
    Close = 3,
    Unknown = usize::MAX,
}

impl From<usize> for SyscallNumber {
    fn from(num: usize) -> Self {
        match num {
            0 => Self::Read,
            1 => Self::Write,
            2 => Self::Open,
            3 => Self::Close,
            _ => Self::Unknown,
        }
    }
}
