//! Buffer descriptors: a possibly-absent slice plus an optional declared
//! capacity.
//!
//! The slice length is the addressable extent and is always enforced. The
//! declared capacity is what the caller claims the buffer holds (the
//! "bound of size"); when it is absent the guard's length ceiling applies
//! instead.

use boundlibc_membrane::{
    BufferFacts, BufferRole, ConstraintGuard, ConstraintViolation, Guarded, ViolationKind,
};

/// Read-only buffer argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct Buffer<'a> {
    data: Option<&'a [u8]>,
    capacity: Option<usize>,
}

impl<'a> Buffer<'a> {
    /// Buffer with unknown capacity.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data: Some(data),
            capacity: None,
        }
    }

    /// Buffer whose capacity the caller declares.
    #[must_use]
    pub const fn with_capacity(data: &'a [u8], capacity: usize) -> Self {
        Self {
            data: Some(data),
            capacity: Some(capacity),
        }
    }

    /// The null buffer.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            data: None,
            capacity: None,
        }
    }

    /// Override the declared capacity; `None` means unknown.
    #[must_use]
    pub const fn bos(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.data.is_none()
    }

    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// What the membrane needs to know about this buffer.
    #[must_use]
    pub fn facts(&self, param: &'static str, role: BufferRole) -> BufferFacts {
        facts_of(param, role, self.data.map(<[u8]>::as_ptr), self.capacity)
            .with_extent(self.data.map_or(0, <[u8]>::len))
    }

    /// Hand out the first `n` bytes once `n` has been validated against
    /// [`facts`](Self::facts).
    pub fn prefix(
        self,
        guard: &ConstraintGuard,
        op: &'static str,
        n: usize,
        facts: &BufferFacts,
    ) -> Guarded<&'a [u8]> {
        match self.data.and_then(|data| data.get(..n)) {
            Some(prefix) => Ok(prefix),
            None => guard.fail(lost_extent(op, facts)),
        }
    }
}

impl<'a> From<&'a [u8]> for Buffer<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<Option<&'a [u8]>> for Buffer<'a> {
    fn from(data: Option<&'a [u8]>) -> Self {
        Self {
            data,
            capacity: None,
        }
    }
}

/// Writable buffer argument.
#[derive(Debug, Default)]
pub struct BufferMut<'a> {
    data: Option<&'a mut [u8]>,
    capacity: Option<usize>,
}

impl<'a> BufferMut<'a> {
    #[must_use]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            data: Some(data),
            capacity: None,
        }
    }

    #[must_use]
    pub fn with_capacity(data: &'a mut [u8], capacity: usize) -> Self {
        Self {
            data: Some(data),
            capacity: Some(capacity),
        }
    }

    #[must_use]
    pub fn null() -> Self {
        Self {
            data: None,
            capacity: None,
        }
    }

    #[must_use]
    pub fn bos(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    #[must_use]
    pub fn facts(&self, param: &'static str, role: BufferRole) -> BufferFacts {
        let ptr = self.data.as_deref().map(<[u8]>::as_ptr);
        facts_of(param, role, ptr, self.capacity)
            .with_extent(self.data.as_deref().map_or(0, <[u8]>::len))
    }

    /// Hand out the first `n` bytes. Only call once the lengths involved
    /// have been validated against [`facts`](Self::facts).
    pub fn into_prefix(
        self,
        guard: &ConstraintGuard,
        op: &'static str,
        n: usize,
        facts: &BufferFacts,
    ) -> Guarded<&'a mut [u8]> {
        match self.data.and_then(|data| data.get_mut(..n)) {
            Some(prefix) => Ok(prefix),
            None => guard.fail(lost_extent(op, facts)),
        }
    }
}

impl<'a> From<&'a mut [u8]> for BufferMut<'a> {
    fn from(data: &'a mut [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<Option<&'a mut [u8]>> for BufferMut<'a> {
    fn from(data: Option<&'a mut [u8]>) -> Self {
        Self {
            data,
            capacity: None,
        }
    }
}

fn facts_of(
    param: &'static str,
    role: BufferRole,
    ptr: Option<*const u8>,
    capacity: Option<usize>,
) -> BufferFacts {
    BufferFacts::new(param, role, ptr.map(|p| p as usize)).with_capacity(capacity)
}

// Unreachable once the extent has been validated; kept as a violation
// rather than a panic.
fn lost_extent(op: &'static str, facts: &BufferFacts) -> ConstraintViolation {
    let kind = if facts.is_null() {
        ViolationKind::NullArgument
    } else {
        ViolationKind::LengthExceedsBound
    };
    ConstraintViolation::new(op, kind, format!("{} is too short", facts.param))
        .at(facts.role, facts.addr.unwrap_or(0))
}
