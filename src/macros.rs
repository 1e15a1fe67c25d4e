/// `Vec<String>` from anything `ToString`, mostly for key path assertions
#[macro_export]
macro_rules! vos {
    ( $( $x:expr ),* $(,)? ) => {
        vec![ $( $x.to_string() ),* ]
    };
}
