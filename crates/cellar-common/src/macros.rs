/// Dispatches the same expression over several enum variants binding the same name.
///
/// ```rust
/// use cellar_common::enum_dispatch;
///
/// pub enum Signer {
///     Interactive(InteractiveSigner),
///     Custodial(CustodialSigner),
/// }
///
/// impl Signer {
///     pub fn address(&self) -> Address {
///         enum_dispatch!(self {
///             Self::Interactive(x) |
///             Self::Custodial(x) => x.address()
///         })
///     }
/// }
/// ```
#[macro_export]
macro_rules! enum_dispatch {
    ($self: ident { $($($variant: pat_param)|* => $do: expr),+ }) => {
        match $self {
            $(
                $($variant => $do),+
            ),+
        }
    };
}

#[cfg(test)]
mod tests {
    enum Bottle {
        Red(u32),
        White(u32),
        Sparkling(String),
    }

    impl Bottle {
        fn vintage(&self) -> u32 {
            enum_dispatch!(self {
                Self::Red(x) |
                Self::White(x) => *x,
                Self::Sparkling(x) => x.len() as u32
            })
        }
    }

    #[test]
    fn dispatch_binds_every_variant() {
        assert_eq!(Bottle::Red(2019).vintage(), 2019);
        assert_eq!(Bottle::White(2021).vintage(), 2021);
        assert_eq!(Bottle::Sparkling("nv".to_string()).vintage(), 2);
    }
}
