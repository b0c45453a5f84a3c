use clrmeta::raw::heaps::table::{AssemblyTable, TableHeap};
use clrmeta::raw::assembly::Assembly;
use clrmeta::raw::pe::PEFile;

fn main() {
    let pe = {
        let bytes = std::fs::read("TestAssembly.dll").unwrap();
        PEFile::try_from(bytes.as_slice()).unwrap()
    };
    let assembly = Assembly::try_from(pe).unwrap();
    let tables = assembly.metadata_root().get_heap::<TableHeap>().unwrap();
    let _table = tables.get_table::<AssemblyTable>().unwrap();
}
