use std::cell::RefCell;
use std::rc::Rc;

use url::Url;

/// Per-tenant location collaborator.
///
/// Only the interception points the window proxy needs are modelled here:
/// reads resolve against the tenant's own URL, while navigation through
/// the proxy's `location` write path goes to the real global instead.
#[derive(Debug)]
pub struct LocationProxy {
    href: RefCell<Url>,
}

impl LocationProxy {
    pub fn new(href: Url) -> Rc<Self> {
        Rc::new(Self {
            href: RefCell::new(href),
        })
    }

    pub fn parse(input: &str) -> Result<Rc<Self>, url::ParseError> {
        Ok(Self::new(Url::parse(input)?))
    }

    pub fn href(&self) -> String {
        self.href.borrow().to_string()
    }

    pub fn host(&self) -> Option<String> {
        self.href.borrow().host_str().map(str::to_string)
    }

    pub fn pathname(&self) -> String {
        self.href.borrow().path().to_string()
    }

    /// Replace the tenant-visible URL without touching the real page.
    pub fn assign(&self, input: &str) -> Result<(), url::ParseError> {
        let next = Url::parse(input)?;
        *self.href.borrow_mut() = next;
        Ok(())
    }
}
