#[macro_export]
macro_rules! bit {
    ($x:expr) => {
        1 << $x
    };
}

#[macro_export]
macro_rules! mask {
    ($x:expr) => {
        $crate::bit!($x) - 1
    };
}
