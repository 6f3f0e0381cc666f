mod encrypted;
mod scenarios;
