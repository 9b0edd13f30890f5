
pub struct CleanupGuard<F: FnOnce()> {
    f: Option<F>,
}

impl<F: FnOnce()> CleanupGuard<F> {
    pub fn new(on_drop: F) -> Self {
        Self { f: Some(on_drop) }
    }
}

impl<F: FnOnce()> Drop for CleanupGuard<F> {
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }
}
