mod data_page;
mod directory_page;

pub use data_page::*;
pub use directory_page::*;

use bytes::{Buf, BufMut};

fn get_i32(data: &[u8], offset: usize) -> i32 {
    (&data[offset..offset + 4]).get_i32()
}

fn put_i32(data: &mut [u8], offset: usize, value: i32) {
    (&mut data[offset..offset + 4]).put_i32(value);
}
