#[cfg(test)]
pub mod test {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::{BindfigError, Decl, Record, Value, Visitor};

    #[derive(Record, Debug, Default, PartialEq)]
    pub struct Service {
        /// The application host.
        #[bind(required)]
        pub host: String,

        /// The port number.
        #[bind(default = "8080")]
        pub port: u16,

        /// Enable debug mode.
        pub debug: bool,

        pub tags: Vec<String>,

        /// Database settings.
        #[bind(nested)]
        pub database: Database,
    }

    #[derive(Record, Debug, Default, PartialEq)]
    pub struct Database {
        /// Connection string URL.
        pub url: String,

        /// Connection pool size.
        #[bind(default = "5")]
        pub pool_size: u32,

        #[bind(embed)]
        pub limits: Limits,
    }

    #[derive(Record, Debug, Default, PartialEq)]
    pub struct Limits {
        pub timeout: Duration,
    }

    // -- Hand-written record with explicit tags ---------------------------------

    #[derive(Debug, Default, PartialEq)]
    pub struct Renamed {
        pub listen: String,
        pub inner: Inner,
    }

    #[derive(Debug, Default, PartialEq)]
    pub struct Inner {
        pub token: String,
        pub log_level: String,
    }

    impl Record for Renamed {
        fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<(), BindfigError> {
            visitor.leaf(
                &Decl::new("listen").tag("env", "BIND_ADDR").tag("flag", "-"),
                &mut self.listen,
            )?;
            visitor.record(&Decl::new("inner").tag("env", "-"), &mut self.inner)
        }
    }

    impl Record for Inner {
        fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<(), BindfigError> {
            visitor.leaf(
                &Decl::new("token").tag("env", "SECRET_TOKEN,exact"),
                &mut self.token,
            )?;
            visitor.leaf(&Decl::new("logLevel"), &mut self.log_level)
        }
    }

    // -- Optional nested record --------------------------------------------------

    #[derive(Record, Debug, Default, PartialEq)]
    pub struct Sparse {
        pub name: String,

        #[bind(nested)]
        pub proxy: Option<Proxy>,
    }

    #[derive(Record, Debug, Default, PartialEq)]
    pub struct Proxy {
        pub url: String,
        pub retries: Option<u8>,
    }

    // -- Every kind the coercion engine knows -----------------------------------

    #[derive(Record, Debug, Default, PartialEq)]
    pub struct Server {
        pub host: String,
        pub port: u16,
    }

    #[derive(Record, Debug, Default, PartialEq)]
    pub struct Kinds {
        pub ratio: f64,
        pub offset: i64,
        pub mask: u8,
        pub interval: Duration,
        pub secret: Vec<u8>,
        pub ports: Vec<u16>,
        pub labels: HashMap<String, String>,
        pub limits: HashMap<String, Duration>,
        pub servers: Vec<Server>,
        pub cert: Option<PathBuf>,
        pub nickname: Option<String>,
        pub extra: Value,
    }

    #[test]
    fn derived_records_default_to_empty() {
        let svc = Service::default();
        assert_eq!(svc.host, "");
        assert_eq!(svc.port, 0);
        assert!(svc.database.limits.timeout.is_zero());
    }
}
