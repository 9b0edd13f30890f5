use core::hint::spin_loop;

use crate::error::Result;

pub trait Sem {
    fn acquire(&self) -> Result<()>;
    fn release(&self) -> Result<()>;
}

pub trait TrySem: Sem {
    fn try_acquire(&self) -> Result<bool>;

    fn try_acquire_tries(&self, tries: usize) -> Result<bool> {
        for _ in 0..tries {
            if self.try_acquire()? {
                return Ok(true);
            }
            spin_loop();
        }
        Ok(false)
    }
}
