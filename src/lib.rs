#[macro_use]
extern crate lazy_static;

pub mod address;
pub mod ccscript;
pub mod compressed;
pub mod config;
pub mod decoder;
pub mod dialogue;
pub mod discovery;
pub mod error;
pub mod opcode_tables;
pub mod output;
pub mod project;
pub mod relocate;
pub mod rom;
pub mod token;


pub use error::{Result, ScriptError};

/*
EarthBound text layout (de-headered HiROM offsets)
        50000   text bank 0
        51b12   text bank 1
        8bc2c   end of bank 1
        8cded   compressed text pointer table
        8d9ed   text bank 2
        9ff2f   end of bank 2
        2f4e20  text bank 3
        2fa37a  end of bank 3
*/
